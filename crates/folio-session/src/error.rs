//! Session error types.

use folio_indexing::IndexingError;
use folio_search::SearchError;
use folio_storage::StorageError;
use folio_sync::SyncError;
use folio_viewer::ViewerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Viewer error: {0}")]
    Viewer(#[from] ViewerError),

    #[error("Indexing error: {0}")]
    Indexing(#[from] IndexingError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// A seed file could not be read
    #[error("Seed file {filename}: {reason}")]
    Seed { filename: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
