//! In-memory sync peer for testing.
//!
//! A [`MockSyncHub`] plays the remote replica: every channel connected to it
//! pushes into one shared log and pulls what other replicas pushed.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use folio_types::{ChangeEntry, RemoteChange};

use crate::channel::SyncChannel;
use crate::error::SyncError;

/// Shared log standing in for the remote replica.
#[derive(Clone, Default)]
pub struct MockSyncHub {
    log: Arc<Mutex<Vec<RemoteChange>>>,
}

impl MockSyncHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a channel attached to this hub.
    pub fn channel(&self) -> MockSyncChannel {
        MockSyncChannel::attached(self.clone())
    }

    /// Append a change as if another replica had pushed it.
    pub fn inject(&self, change: RemoteChange) {
        if let Ok(mut log) = self.log.lock() {
            log.push(change);
        }
    }

    /// Everything the hub has received so far.
    pub fn changes(&self) -> Vec<RemoteChange> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }
}

#[derive(Default)]
struct ChannelState {
    endpoint: Option<String>,
    replica_id: Option<String>,
    cursor: usize,
}

/// Channel to a [`MockSyncHub`] with switchable failures.
pub struct MockSyncChannel {
    hub: MockSyncHub,
    state: Mutex<ChannelState>,
    fail_open: AtomicBool,
    fail_push: AtomicBool,
    fail_pull: AtomicBool,
    open_calls: AtomicUsize,
}

impl MockSyncChannel {
    /// Create a channel with its own private hub.
    pub fn new() -> Self {
        Self::attached(MockSyncHub::new())
    }

    fn attached(hub: MockSyncHub) -> Self {
        Self {
            hub,
            state: Mutex::new(ChannelState::default()),
            fail_open: AtomicBool::new(false),
            fail_push: AtomicBool::new(false),
            fail_pull: AtomicBool::new(false),
            open_calls: AtomicUsize::new(0),
        }
    }

    pub fn hub(&self) -> &MockSyncHub {
        &self.hub
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_push(&self, fail: bool) {
        self.fail_push.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_pull(&self, fail: bool) {
        self.fail_pull.store(fail, Ordering::SeqCst);
    }

    /// Number of times `open` was called.
    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.state
            .lock()
            .map(|s| s.endpoint.is_some())
            .unwrap_or(false)
    }

    fn state(&self) -> Result<std::sync::MutexGuard<'_, ChannelState>, SyncError> {
        self.state
            .lock()
            .map_err(|e| SyncError::ConnectionFailed(e.to_string()))
    }
}

impl Default for MockSyncChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyncChannel for MockSyncChannel {
    async fn open(&self, endpoint: &str, replica_id: &str) -> Result<(), SyncError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(SyncError::ConnectionFailed(format!(
                "{} refused connection",
                endpoint
            )));
        }
        let mut state = self.state()?;
        state.endpoint = Some(endpoint.to_string());
        state.replica_id = Some(replica_id.to_string());
        Ok(())
    }

    async fn push(&self, changes: &[ChangeEntry]) -> Result<u64, SyncError> {
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(SyncError::ConnectionFailed("connection reset during push".into()));
        }
        let state = self.state()?;
        let origin = state.replica_id.clone().ok_or(SyncError::NotConnected)?;

        let mut log = self
            .hub
            .log
            .lock()
            .map_err(|e| SyncError::ConnectionFailed(e.to_string()))?;
        for entry in changes {
            log.push(RemoteChange::from_entry(origin.as_str(), entry));
        }
        Ok(changes.last().map(|c| c.sequence).unwrap_or(0))
    }

    async fn pull(&self) -> Result<Vec<RemoteChange>, SyncError> {
        if self.fail_pull.load(Ordering::SeqCst) {
            return Err(SyncError::ConnectionFailed("connection reset during pull".into()));
        }
        let mut state = self.state()?;
        let origin = state.replica_id.clone().ok_or(SyncError::NotConnected)?;

        let log = self
            .hub
            .log
            .lock()
            .map_err(|e| SyncError::ConnectionFailed(e.to_string()))?;
        let incoming = log[state.cursor.min(log.len())..]
            .iter()
            .filter(|c| c.origin != origin)
            .cloned()
            .collect();
        state.cursor = log.len();
        Ok(incoming)
    }

    async fn close(&self) -> Result<(), SyncError> {
        let mut state = self.state()?;
        state.endpoint = None;
        Ok(())
    }
}
