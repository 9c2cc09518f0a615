//! Extraction and index build.
//!
//! A document's fragment set is either empty or complete: every page of a
//! document is extracted before any of its fragments are written, and all
//! new fragments of a run land in one batch. Re-running with everything
//! extracted only rebuilds the index.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use folio_search::{QueryService, SearchIndex};
use folio_storage::Storage;
use folio_types::TextFragment;
use folio_viewer::ViewerLifecycleManager;

use crate::error::IndexingError;
use crate::report::IndexingReport;

/// Drives text extraction through the viewer and rebuilds the search index.
pub struct IndexingPipeline {
    storage: Arc<Storage>,
    lifecycle: Arc<ViewerLifecycleManager>,
    query: Arc<QueryService>,
    // Runs never overlap
    run_lock: Mutex<()>,
}

impl IndexingPipeline {
    pub fn new(
        storage: Arc<Storage>,
        lifecycle: Arc<ViewerLifecycleManager>,
        query: Arc<QueryService>,
    ) -> Self {
        Self {
            storage,
            lifecycle,
            query,
            run_lock: Mutex::new(()),
        }
    }

    /// Extract every unindexed document, then rebuild and install the index.
    pub async fn run(&self) -> Result<IndexingReport, IndexingError> {
        let _guard = self.run_lock.lock().await;
        let mut report = IndexingReport::new();

        let titles: HashMap<String, String> = self
            .storage
            .list_documents()?
            .into_iter()
            .map(|meta| (meta.id, meta.title))
            .collect();
        report.documents = titles.len();

        let mut by_document: HashMap<String, Vec<TextFragment>> = HashMap::new();
        let mut orphans = Vec::new();
        for fragment in self.storage.all_fragments()? {
            if titles.contains_key(&fragment.document_id) {
                by_document
                    .entry(fragment.document_id.clone())
                    .or_default()
                    .push(fragment);
            } else if let Some(id) = fragment.id {
                orphans.push(id);
            }
        }
        if !orphans.is_empty() {
            report.orphans_pruned = self.storage.delete_fragments(&orphans)?;
            info!(pruned = report.orphans_pruned, "Pruned orphaned fragments");
        }

        let mut needs_indexing: Vec<&String> = titles
            .keys()
            .filter(|id| !by_document.contains_key(*id))
            .collect();
        needs_indexing.sort();
        report.already_indexed = titles.len() - needs_indexing.len();

        let mut indexed: Vec<TextFragment> = by_document.into_values().flatten().collect();

        if !needs_indexing.is_empty() {
            info!(
                pending = needs_indexing.len(),
                already_indexed = report.already_indexed,
                "Extracting document text"
            );
            let snapshot = self.lifecycle.snapshot_tabs().await;

            let mut candidates = Vec::new();
            for document_id in needs_indexing {
                match self.lifecycle.extract_document_text(document_id).await {
                    Ok(fragments) => {
                        debug!(document_id = %document_id, fragments = fragments.len(), "Extracted");
                        candidates.extend(fragments);
                        report.extracted += 1;
                    }
                    Err(e) => {
                        warn!(document_id = %document_id, error = %e, "Extraction failed, skipping document");
                        report.record_failure(document_id.as_str());
                    }
                }
            }

            let persisted = if candidates.is_empty() {
                Ok(Vec::new())
            } else {
                self.storage.bulk_upsert_fragments(candidates)
            };

            // The tabs go back even when the fragments could not be stored
            if let Err(e) = self.lifecycle.restore_tabs(snapshot).await {
                warn!(error = %e, "Could not restore the active tab after extraction");
            }

            let persisted = persisted?;
            report.fragments_created = persisted.len();
            indexed.extend(persisted);
        }

        let index = SearchIndex::build(&indexed, &titles)?;
        report.indexed_fragments = index.num_docs();
        self.query.install(index);

        info!(%report, "Indexing run complete");
        Ok(report)
    }

    /// Drop the stored fragments of `document_id` and run the pipeline, so
    /// the document is extracted again.
    pub async fn reindex_document(&self, document_id: &str) -> Result<IndexingReport, IndexingError> {
        let ids: Vec<String> = self
            .storage
            .fragments_for_document(document_id)?
            .into_iter()
            .filter_map(|fragment| fragment.id)
            .collect();
        let removed = self.storage.delete_fragments(&ids)?;
        debug!(document_id, removed, "Cleared fragments for reindex");
        self.run().await
    }

    /// Rebuild the index from persisted fragments without extracting.
    pub async fn rebuild_index(&self) -> Result<u64, IndexingError> {
        let _guard = self.run_lock.lock().await;
        let titles: HashMap<String, String> = self
            .storage
            .list_documents()?
            .into_iter()
            .map(|meta| (meta.id, meta.title))
            .collect();
        let index = SearchIndex::build(&self.storage.all_fragments()?, &titles)?;
        let num_docs = index.num_docs();
        self.query.install(index);
        Ok(num_docs)
    }
}
