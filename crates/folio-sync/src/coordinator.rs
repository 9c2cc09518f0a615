//! Sync coordinator.
//!
//! Connect sequence: `connecting` → open channel → `syncing` → push pending
//! local changes in log order → pull and apply peer changes → `connected`.
//! Any transport failure moves the status to `error` and leaves the store as
//! it was after the last fully applied change.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use folio_storage::{RemoteApplyOutcome, Storage};
use folio_types::SyncStatus;

use crate::channel::SyncChannel;
use crate::checkpoint::{SyncCheckpoint, SYNC_CHECKPOINT_KEY};
use crate::error::SyncError;

/// Default number of change log entries pushed per round trip
pub const DEFAULT_PUSH_BATCH: usize = 100;

/// Counters from one push/pull round.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Local changes acknowledged by the peer
    pub pushed: usize,
    /// Peer changes that wrote at least one field or deleted a document
    pub applied: usize,
    /// Peer changes that lost every field to newer writes
    pub stale: usize,
    /// Peer changes ignored for lack of required fields
    pub incomplete: usize,
}

/// Drives replication between the local store and one remote endpoint.
pub struct SyncCoordinator {
    storage: Arc<Storage>,
    channel: Arc<dyn SyncChannel>,
    status_tx: watch::Sender<SyncStatus>,
    /// Endpoint of the open channel; also serializes connect/sync/disconnect
    endpoint: Mutex<Option<String>>,
    push_batch: usize,
}

impl SyncCoordinator {
    pub fn new(storage: Arc<Storage>, channel: Arc<dyn SyncChannel>) -> Self {
        let (status_tx, _) = watch::channel(SyncStatus::Disconnected);
        Self {
            storage,
            channel,
            status_tx,
            endpoint: Mutex::new(None),
            push_batch: DEFAULT_PUSH_BATCH,
        }
    }

    /// Set the number of change log entries sent per push.
    pub fn with_push_batch(mut self, push_batch: usize) -> Self {
        self.push_batch = push_batch.max(1);
        self
    }

    /// Current status.
    pub fn status(&self) -> SyncStatus {
        *self.status_tx.borrow()
    }

    /// Subscribe to status transitions.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    fn set_status(&self, status: SyncStatus) {
        self.status_tx.send_replace(status);
        debug!(%status, "Sync status changed");
    }

    /// Connect to `endpoint` and run one sync round.
    ///
    /// Connecting again to the endpoint already connected is a no-op. A
    /// different endpoint closes the current channel first.
    pub async fn connect(&self, endpoint: &str) -> Result<SyncReport, SyncError> {
        let mut current = self.endpoint.lock().await;

        if current.as_deref() == Some(endpoint) && self.status() == SyncStatus::Connected {
            debug!(endpoint, "Already connected");
            return Ok(SyncReport::default());
        }
        if current.is_some() {
            self.close_channel().await;
            *current = None;
        }

        self.set_status(SyncStatus::Connecting);
        info!(endpoint, "Connecting to sync endpoint");

        if let Err(e) = self.channel.open(endpoint, self.storage.replica_id()).await {
            warn!(endpoint, error = %e, "Sync connection failed");
            self.set_status(SyncStatus::Error);
            return Err(into_connection_failed(e));
        }
        *current = Some(endpoint.to_string());

        let report = self.run_round().await?;
        info!(
            endpoint,
            pushed = report.pushed,
            applied = report.applied,
            "Sync connected"
        );
        Ok(report)
    }

    /// Run another push/pull round on the open channel.
    pub async fn sync_now(&self) -> Result<SyncReport, SyncError> {
        let current = self.endpoint.lock().await;
        if current.is_none() {
            return Err(SyncError::NotConnected);
        }
        self.run_round().await
    }

    /// Close the channel. Local state is untouched.
    pub async fn disconnect(&self) {
        let mut current = self.endpoint.lock().await;
        if current.take().is_some() {
            self.close_channel().await;
            info!("Sync disconnected");
        }
        self.set_status(SyncStatus::Disconnected);
    }

    async fn close_channel(&self) {
        if let Err(e) = self.channel.close().await {
            warn!(error = %e, "Failed to close sync channel");
        }
    }

    async fn run_round(&self) -> Result<SyncReport, SyncError> {
        self.set_status(SyncStatus::Syncing);
        match self.push_and_pull().await {
            Ok(report) => {
                self.set_status(SyncStatus::Connected);
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "Sync round failed");
                self.set_status(SyncStatus::Error);
                Err(into_connection_failed(e))
            }
        }
    }

    async fn push_and_pull(&self) -> Result<SyncReport, SyncError> {
        let mut checkpoint = self.load_checkpoint()?;
        let mut report = SyncReport::default();

        loop {
            let pending = self
                .storage
                .get_changes(checkpoint.acked_sequence + 1, self.push_batch)?;
            let Some(first) = pending.first().map(|c| c.sequence) else {
                break;
            };

            let acked = self.channel.push(&pending).await?;
            let accepted = pending.iter().filter(|c| c.sequence <= acked).count();
            if acked < first || accepted == 0 {
                warn!(acked, first, "Peer acknowledged nothing, stopping push");
                break;
            }

            checkpoint.acknowledge(acked, accepted as u64);
            self.save_checkpoint(&checkpoint)?;
            self.storage.delete_changes(acked)?;
            report.pushed += accepted;
            debug!(acked, accepted, "Pushed local changes");
        }

        let incoming = self.channel.pull().await?;
        for change in &incoming {
            match self.storage.apply_remote_change(change)? {
                RemoteApplyOutcome::Applied(_) | RemoteApplyOutcome::Deleted => report.applied += 1,
                RemoteApplyOutcome::Stale => report.stale += 1,
                RemoteApplyOutcome::Incomplete => report.incomplete += 1,
            }
        }
        checkpoint.record_pull(incoming.len() as u64);
        self.save_checkpoint(&checkpoint)?;

        Ok(report)
    }

    /// Persisted replication progress.
    pub fn load_checkpoint(&self) -> Result<SyncCheckpoint, SyncError> {
        match self.storage.get_checkpoint(SYNC_CHECKPOINT_KEY)? {
            Some(bytes) => SyncCheckpoint::from_bytes(&bytes),
            None => Ok(SyncCheckpoint::default()),
        }
    }

    fn save_checkpoint(&self, checkpoint: &SyncCheckpoint) -> Result<(), SyncError> {
        self.storage
            .put_checkpoint(SYNC_CHECKPOINT_KEY, &checkpoint.to_bytes()?)?;
        Ok(())
    }
}

/// Storage and checkpoint failures keep their own variants; everything the
/// transport reports is a connection failure.
fn into_connection_failed(err: SyncError) -> SyncError {
    match err {
        SyncError::ConnectionFailed(_) | SyncError::Storage(_) | SyncError::Serialization(_) => err,
        other => SyncError::ConnectionFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockSyncChannel, MockSyncHub};
    use folio_types::{DocumentPatch, DocumentRecord, RemoteChange};
    use tempfile::TempDir;

    fn create_storage() -> (Arc<Storage>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp_dir.path()).unwrap());
        (storage, temp_dir)
    }

    fn doc(id: &str, title: &str) -> DocumentRecord {
        DocumentRecord::new(id, format!("{}.pdf", id), title, b"%PDF".to_vec())
    }

    #[tokio::test]
    async fn test_connect_pushes_pending_changes_in_order() {
        let (storage, _temp) = create_storage();
        storage
            .bulk_add_documents(&[doc("d1", "Doc One"), doc("d2", "Doc Two")])
            .unwrap();
        let channel = Arc::new(MockSyncChannel::new());
        let coordinator = SyncCoordinator::new(storage.clone(), channel.clone()).with_push_batch(1);

        let report = coordinator.connect("mock://peer").await.unwrap();

        assert_eq!(report.pushed, 2);
        assert_eq!(coordinator.status(), SyncStatus::Connected);
        let pushed: Vec<String> = channel.hub().changes().into_iter().map(|c| c.document_id).collect();
        assert_eq!(pushed, vec!["d1", "d2"]);
        assert!(storage.get_changes(0, 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let (storage, _temp) = create_storage();
        let channel = Arc::new(MockSyncChannel::new());
        let coordinator = SyncCoordinator::new(storage, channel.clone());

        coordinator.connect("mock://peer").await.unwrap();
        coordinator.connect("mock://peer").await.unwrap();

        assert_eq!(channel.open_calls(), 1);
        assert_eq!(coordinator.status(), SyncStatus::Connected);
    }

    #[tokio::test]
    async fn test_connection_failure_leaves_store_untouched() {
        let (storage, _temp) = create_storage();
        storage.put_document(&doc("d1", "Doc One")).unwrap();
        let channel = Arc::new(MockSyncChannel::new());
        channel.set_fail_open(true);
        let coordinator = SyncCoordinator::new(storage.clone(), channel);

        let err = coordinator.connect("mock://down").await.unwrap_err();

        assert!(matches!(err, SyncError::ConnectionFailed(_)));
        assert_eq!(coordinator.status(), SyncStatus::Error);
        assert_eq!(storage.get_changes(0, 10).unwrap().len(), 1);
        assert!(storage.get_document("d1").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_push_failure_keeps_changes_for_retry() {
        let (storage, _temp) = create_storage();
        storage.put_document(&doc("d1", "Doc One")).unwrap();
        let channel = Arc::new(MockSyncChannel::new());
        channel.set_fail_push(true);
        let coordinator = SyncCoordinator::new(storage.clone(), channel.clone());

        assert!(coordinator.connect("mock://peer").await.is_err());
        assert_eq!(storage.get_changes(0, 10).unwrap().len(), 1);

        channel.set_fail_push(false);
        let report = coordinator.connect("mock://peer").await.unwrap();
        assert_eq!(report.pushed, 1);
    }

    #[tokio::test]
    async fn test_peer_changes_applied_without_echo() {
        let (storage, _temp) = create_storage();
        let channel = Arc::new(MockSyncChannel::new());
        channel.hub().inject(RemoteChange::create(
            "peer",
            3,
            "d9",
            doc("d9", "From Peer").to_patch(),
        ));
        let coordinator = SyncCoordinator::new(storage.clone(), channel.clone());

        let report = coordinator.connect("mock://peer").await.unwrap();

        assert_eq!(report.applied, 1);
        assert_eq!(storage.get_document("d9").unwrap().unwrap().title, "From Peer");
        assert!(storage.get_changes(0, 10).unwrap().is_empty());

        coordinator.sync_now().await.unwrap();
        assert_eq!(channel.hub().changes().len(), 1);
    }

    #[tokio::test]
    async fn test_later_log_position_wins() {
        let (storage, _temp) = create_storage();
        storage
            .bulk_add_documents(&[doc("a", "Doc A"), doc("b", "Doc B")])
            .unwrap();
        storage
            .update_document("a", &DocumentPatch::new().annotation_state(b"LOCAL".to_vec()))
            .unwrap();
        let local_position = storage.log_head() - 1;

        let channel = Arc::new(MockSyncChannel::new());
        channel.hub().inject(RemoteChange::update(
            "peer",
            local_position + 5,
            "a",
            DocumentPatch::new().annotation_state(b"REMOTE".to_vec()),
        ));
        let coordinator = SyncCoordinator::new(storage.clone(), channel);
        coordinator.connect("mock://peer").await.unwrap();

        let a = storage.get_document("a").unwrap().unwrap();
        assert_eq!(a.annotation_state, Some(b"REMOTE".to_vec()));
        assert_eq!(a.title, "Doc A");
        assert_eq!(a.content, b"%PDF".to_vec());
        assert!(storage.get_document("b").unwrap().unwrap().annotation_state.is_none());
    }

    #[tokio::test]
    async fn test_two_replicas_converge() {
        let hub = MockSyncHub::new();
        let (left_store, _t1) = create_storage();
        let (right_store, _t2) = create_storage();
        let left = SyncCoordinator::new(left_store.clone(), Arc::new(hub.channel()));
        let right = SyncCoordinator::new(right_store.clone(), Arc::new(hub.channel()));

        left_store.put_document(&doc("d1", "Doc One")).unwrap();
        left.connect("mock://hub").await.unwrap();
        right.connect("mock://hub").await.unwrap();
        assert_eq!(right_store.get_document("d1").unwrap().unwrap().title, "Doc One");

        // Concurrent offline edits of the same field
        left_store
            .update_document("d1", &DocumentPatch::new().annotation_state(b"LEFT".to_vec()))
            .unwrap();
        right_store
            .update_document("d1", &DocumentPatch::new().annotation_state(b"DRAFT".to_vec()))
            .unwrap();
        right_store
            .update_document("d1", &DocumentPatch::new().annotation_state(b"RIGHT".to_vec()))
            .unwrap();

        left.sync_now().await.unwrap();
        right.sync_now().await.unwrap();
        left.sync_now().await.unwrap();

        let l = left_store.get_document("d1").unwrap().unwrap();
        let r = right_store.get_document("d1").unwrap().unwrap();
        assert_eq!(l.annotation_state, r.annotation_state);
        // Right's second edit holds the highest log position
        assert_eq!(r.annotation_state, Some(b"RIGHT".to_vec()));
        assert_eq!(l.title, "Doc One");
    }

    #[tokio::test]
    async fn test_disconnect_and_sync_now_requires_connection() {
        let (storage, _temp) = create_storage();
        let channel = Arc::new(MockSyncChannel::new());
        let coordinator = SyncCoordinator::new(storage, channel.clone());
        let mut status = coordinator.subscribe();

        coordinator.connect("mock://peer").await.unwrap();
        assert_eq!(*status.borrow_and_update(), SyncStatus::Connected);

        coordinator.disconnect().await;
        assert_eq!(coordinator.status(), SyncStatus::Disconnected);
        assert!(!channel.is_open());
        assert!(matches!(coordinator.sync_now().await, Err(SyncError::NotConnected)));
    }
}
