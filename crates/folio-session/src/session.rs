//! Startup pipeline and session ownership.

use std::sync::Arc;

use tracing::{info, warn};

use folio_indexing::{IndexingPipeline, IndexingReport};
use folio_search::QueryService;
use folio_storage::Storage;
use folio_sync::{SyncChannel, SyncCoordinator, SyncReport};
use folio_types::Settings;
use folio_viewer::{EditorService, NoteLinker, ViewerLifecycleManager, ViewerService};

use crate::error::SessionError;
use crate::search_bar::SearchBar;
use crate::seed::{reseed, seed_store};

/// What happened during startup.
#[derive(Debug, Default)]
pub struct StartupReport {
    /// Outcome of the initial sync round, `None` when sync is not configured
    pub sync: Option<Result<SyncReport, String>>,
    /// Documents added by seeding
    pub seeded: usize,
    /// Outcome of the initial indexing run, `None` when skipped
    pub indexing: Option<Result<IndexingReport, String>>,
}

/// One open store with everything that works on it.
pub struct Session {
    settings: Settings,
    storage: Arc<Storage>,
    lifecycle: Arc<ViewerLifecycleManager>,
    query: Arc<QueryService>,
    pipeline: IndexingPipeline,
    search_bar: SearchBar,
    sync: Option<SyncCoordinator>,
}

impl Session {
    /// Run the startup pipeline.
    ///
    /// Only a store that cannot be opened or a failed seed aborts startup.
    /// Sync and indexing failures are recorded in the report.
    pub async fn start(
        settings: Settings,
        viewer: Arc<dyn ViewerService>,
        channel: Option<Arc<dyn SyncChannel>>,
    ) -> Result<(Self, StartupReport), SessionError> {
        let mut report = StartupReport::default();

        let db_path = settings.expanded_db_path();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let storage = Arc::new(Storage::open(&db_path)?);
        info!(path = ?db_path, "Store opened");

        let sync = channel.map(|channel| SyncCoordinator::new(storage.clone(), channel));
        if let (Some(coordinator), Some(endpoint)) = (sync.as_ref(), settings.sync_endpoint.as_deref()) {
            let outcome = coordinator.connect(endpoint).await;
            if let Err(e) = &outcome {
                warn!(endpoint, error = %e, "Sync unavailable, continuing offline");
            }
            report.sync = Some(outcome.map_err(|e| e.to_string()));
        }

        report.seeded = seed_store(&storage, &settings.seed, &settings.expanded_assets_dir())?;

        let lifecycle = Arc::new(ViewerLifecycleManager::new(viewer, storage.clone()));
        let query = Arc::new(QueryService::new(storage.clone()).with_limit(settings.search_limit));
        let pipeline = IndexingPipeline::new(storage.clone(), lifecycle.clone(), query.clone());
        let search_bar = SearchBar::new(query.clone(), lifecycle.clone());

        let session = Self {
            settings,
            storage,
            lifecycle,
            query,
            pipeline,
            search_bar,
            sync,
        };

        if session.settings.index_on_startup {
            report.indexing = Some(session.index().await.map_err(|e| e.to_string()));
        }

        info!(seeded = report.seeded, "Session started");
        Ok((session, report))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn lifecycle(&self) -> &Arc<ViewerLifecycleManager> {
        &self.lifecycle
    }

    pub fn query(&self) -> &Arc<QueryService> {
        &self.query
    }

    pub fn sync(&self) -> Option<&SyncCoordinator> {
        self.sync.as_ref()
    }

    pub fn search_bar(&self) -> &SearchBar {
        &self.search_bar
    }

    pub fn note_linker(&self, editor: Arc<dyn EditorService>) -> NoteLinker {
        NoteLinker::new(self.lifecycle.clone(), editor)
    }

    /// Run the indexing pipeline. Safe to call again after a failure.
    ///
    /// The search bar forgets its previous query once a new index is live.
    pub async fn index(&self) -> Result<IndexingReport, SessionError> {
        match self.pipeline.run().await {
            Ok(report) => {
                self.search_bar.reset();
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "Indexing run failed");
                Err(e.into())
            }
        }
    }

    /// Clear the store, seed it again and reindex.
    pub async fn reset(&self) -> Result<IndexingReport, SessionError> {
        self.lifecycle.restore_tabs(Default::default()).await?;
        reseed(&self.storage, &self.settings.seed, &self.settings.expanded_assets_dir())?;
        self.index().await
    }

    /// Flush pending saves, close the viewer and the sync channel.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.lifecycle.flush_pending_saves().await;
        self.lifecycle.close().await;
        if let Some(sync) = &self.sync {
            sync.disconnect().await;
        }
        self.storage.flush()?;
        info!("Session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_sync::MockSyncChannel;
    use folio_types::{DocumentPatch, RemoteChange, SeedEntry, SyncStatus};
    use folio_viewer::mock::MockViewer;
    use tempfile::TempDir;

    fn settings() -> (Settings, (TempDir, TempDir)) {
        let db = TempDir::new().unwrap();
        let assets = TempDir::new().unwrap();
        std::fs::write(assets.path().join("dummy.pdf"), b"%PDF-1.4").unwrap();
        let settings = Settings {
            db_path: db.path().join("db").to_string_lossy().to_string(),
            assets_dir: assets.path().to_string_lossy().to_string(),
            seed: vec![SeedEntry::new("dummy.pdf", "PDF 01")],
            ..Default::default()
        };
        (settings, (db, assets))
    }

    #[tokio::test]
    async fn test_startup_seeds_and_indexes() {
        let (settings, _dirs) = settings();
        let viewer = Arc::new(MockViewer::new());

        let (session, report) = Session::start(settings, viewer, None).await.unwrap();

        assert!(report.sync.is_none());
        assert_eq!(report.seeded, 1);
        let indexing = report.indexing.unwrap().unwrap();
        assert_eq!(indexing.extracted, 1);
        assert!(session.query().is_ready());
        assert_eq!(session.search_bar().search("page").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sync_failure_is_not_fatal() {
        let (mut settings, _dirs) = settings();
        settings.sync_endpoint = Some("wss://peer.invalid/sync".to_string());
        let channel = Arc::new(MockSyncChannel::new());
        channel.set_fail_open(true);
        let channel: Arc<dyn SyncChannel> = channel;

        let (session, report) = Session::start(settings, Arc::new(MockViewer::new()), Some(channel))
            .await
            .unwrap();

        assert!(matches!(report.sync, Some(Err(_))));
        assert_eq!(report.seeded, 1);
        assert_eq!(session.sync().unwrap().status(), SyncStatus::Error);
    }

    #[tokio::test]
    async fn test_sync_connects_and_disconnects() {
        let (mut settings, _dirs) = settings();
        settings.sync_endpoint = Some("wss://peer.example/sync".to_string());
        let channel = Arc::new(MockSyncChannel::new());
        let dyn_channel: Arc<dyn SyncChannel> = channel.clone();

        let (session, report) = Session::start(settings, Arc::new(MockViewer::new()), Some(dyn_channel))
            .await
            .unwrap();

        assert!(matches!(report.sync, Some(Ok(_))));
        assert_eq!(channel.open_calls(), 1);
        assert_eq!(session.sync().unwrap().status(), SyncStatus::Connected);
        session.shutdown().await.unwrap();
        assert_eq!(session.sync().unwrap().status(), SyncStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_peer_documents_suppress_seeding() {
        let (mut settings, _dirs) = settings();
        settings.sync_endpoint = Some("wss://peer.example/sync".to_string());
        let channel = Arc::new(MockSyncChannel::new());
        channel.hub().inject(RemoteChange::create(
            "peer",
            1,
            "remote.pdf",
            DocumentPatch::new()
                .filename("remote.pdf")
                .title("From Peer")
                .content(b"%PDF".to_vec()),
        ));
        let dyn_channel: Arc<dyn SyncChannel> = channel;

        let (session, report) = Session::start(settings, Arc::new(MockViewer::new()), Some(dyn_channel))
            .await
            .unwrap();

        assert_eq!(report.seeded, 0);
        let ids: Vec<String> = session
            .storage()
            .list_documents()
            .unwrap()
            .into_iter()
            .map(|meta| meta.id)
            .collect();
        assert_eq!(ids, vec!["remote.pdf"]);
    }

    #[tokio::test]
    async fn test_missing_seed_file_aborts_startup() {
        let (mut settings, _dirs) = settings();
        settings.seed.push(SeedEntry::new("missing.pdf", "Missing"));

        let result = Session::start(settings, Arc::new(MockViewer::new()), None).await;
        assert!(matches!(result, Err(SessionError::Seed { .. })));
    }

    #[tokio::test]
    async fn test_indexing_failure_is_retryable() {
        let (settings, _dirs) = settings();
        let viewer = Arc::new(MockViewer::new());
        viewer.fail_document("dummy.pdf");

        let (session, report) = Session::start(settings, viewer.clone(), None).await.unwrap();
        let first = report.indexing.unwrap().unwrap();
        assert_eq!(first.failed, vec!["dummy.pdf"]);

        // The failed document has no fragments, so the next run retries it
        let second = session.index().await.unwrap();
        assert_eq!(second.already_indexed, 0);
        assert_eq!(second.failed, vec!["dummy.pdf"]);
    }

    #[tokio::test]
    async fn test_indexing_can_be_deferred() {
        let (mut settings, _dirs) = settings();
        settings.index_on_startup = false;

        let (session, report) = Session::start(settings, Arc::new(MockViewer::new()), None)
            .await
            .unwrap();

        assert!(report.indexing.is_none());
        assert!(!session.search_bar().is_enabled());
        session.index().await.unwrap();
        assert!(session.search_bar().is_enabled());
    }

    #[tokio::test]
    async fn test_search_bar_refreshes_after_reindex() {
        let (mut settings, _dirs) = settings();
        settings.index_on_startup = false;
        let viewer = Arc::new(MockViewer::new());
        viewer.set_pages("dummy.pdf", vec![vec!["first draft".to_string()]]);
        let (session, _report) = Session::start(settings, viewer.clone(), None).await.unwrap();

        session.index().await.unwrap();
        assert_eq!(session.search_bar().search("draft").unwrap()[0].text, "first draft");

        viewer.set_pages("dummy.pdf", vec![vec!["final draft".to_string()]]);
        session.reset().await.unwrap();

        let results = session.search_bar().search("draft").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "final draft");
    }

    #[tokio::test]
    async fn test_reset_reseeds_and_reindexes() {
        let (settings, _dirs) = settings();
        let (session, _report) = Session::start(settings, Arc::new(MockViewer::new()), None)
            .await
            .unwrap();
        session.lifecycle().open_new_tab("dummy.pdf").await.unwrap();

        let report = session.reset().await.unwrap();

        assert_eq!(report.extracted, 1);
        assert!(session.lifecycle().tabs().await.is_empty());
        assert_eq!(session.storage().document_count().unwrap(), 1);
    }
}
