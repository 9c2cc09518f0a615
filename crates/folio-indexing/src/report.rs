//! Outcome of one indexing run.

use std::fmt;

/// Counters describing one run of the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexingReport {
    /// Documents in the store at the start of the run
    pub documents: usize,
    /// Documents that already had a complete fragment set
    pub already_indexed: usize,
    /// Documents extracted during this run
    pub extracted: usize,
    /// Documents skipped after an extraction failure
    pub failed: Vec<String>,
    /// Fragments persisted during this run
    pub fragments_created: usize,
    /// Fragments removed because their document no longer exists
    pub orphans_pruned: usize,
    /// Fragments in the installed search index
    pub indexed_fragments: u64,
}

impl IndexingReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no document was skipped.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn record_failure(&mut self, document_id: impl Into<String>) {
        self.failed.push(document_id.into());
    }
}

impl fmt::Display for IndexingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} documents ({} indexed, {} extracted, {} failed), {} new fragments, {} pruned, {} searchable",
            self.documents,
            self.already_indexed,
            self.extracted,
            self.failed.len(),
            self.fragments_created,
            self.orphans_pruned,
            self.indexed_fragments
        )
    }
}
