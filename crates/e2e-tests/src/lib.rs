//! End-to-end test infrastructure for folio.
//!
//! Provides a shared TestHarness wiring a temporary store, the mock viewer,
//! the lifecycle manager, the query service and the indexing pipeline.

use std::sync::Arc;

use folio_indexing::IndexingPipeline;
use folio_search::QueryService;
use folio_storage::Storage;
use folio_types::DocumentRecord;
use folio_viewer::mock::MockViewer;
use folio_viewer::ViewerLifecycleManager;

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub storage: Arc<Storage>,
    pub viewer: Arc<MockViewer>,
    pub lifecycle: Arc<ViewerLifecycleManager>,
    pub query: Arc<QueryService>,
    pub pipeline: IndexingPipeline,
}

impl TestHarness {
    /// Create a harness over an empty store.
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let storage =
            Arc::new(Storage::open(temp_dir.path()).expect("Failed to open test storage"));
        let viewer = Arc::new(MockViewer::new());
        let lifecycle = Arc::new(ViewerLifecycleManager::new(viewer.clone(), storage.clone()));
        let query = Arc::new(QueryService::new(storage.clone()));
        let pipeline = IndexingPipeline::new(storage.clone(), lifecycle.clone(), query.clone());

        Self {
            _temp_dir: temp_dir,
            storage,
            viewer,
            lifecycle,
            query,
            pipeline,
        }
    }

    /// Create a harness seeded with `(id, title)` documents.
    pub fn with_documents(documents: &[(&str, &str)]) -> Self {
        let harness = Self::new();
        seed_documents(&harness.storage, documents);
        harness
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Add `(id, title)` documents, each with a `{id}.pdf` filename.
pub fn seed_documents(storage: &Storage, documents: &[(&str, &str)]) {
    let records: Vec<DocumentRecord> = documents
        .iter()
        .map(|(id, title)| {
            DocumentRecord::new(*id, format!("{}.pdf", id), *title, b"%PDF-1.4".to_vec())
        })
        .collect();
    storage
        .bulk_add_documents(&records)
        .expect("Failed to seed documents");
}

/// Open a second store in its own temp dir, for a peer replica.
pub fn open_peer_storage() -> (tempfile::TempDir, Arc<Storage>) {
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let storage = Arc::new(Storage::open(temp_dir.path()).expect("Failed to open peer storage"));
    (temp_dir, storage)
}
