//! Error types for the indexing pipeline.

use folio_search::SearchError;
use folio_storage::StorageError;
use folio_viewer::ViewerError;
use thiserror::Error;

/// Errors that abort an indexing run.
///
/// Per-document extraction failures are not errors; they are recorded in
/// the run's report.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Storage operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Index build failed
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Viewer error: {0}")]
    Viewer(#[from] ViewerError),
}
