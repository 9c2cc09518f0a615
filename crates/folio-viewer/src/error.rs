//! Viewer error types.

use folio_storage::StorageError;
use folio_types::FolioError;
use thiserror::Error;

/// Errors surfaced by the viewer lifecycle and its collaborators
#[derive(Error, Debug)]
pub enum ViewerError {
    /// The document backing a tab is missing from the store
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// An internal link names a document the store does not know
    #[error("Unknown document in link: {0}")]
    UnknownDocument(String),

    #[error("Invalid tab index {index} ({len} tabs open)")]
    InvalidTabIndex { index: usize, len: usize },

    /// The viewer could not display a document
    #[error("Viewer failed to load: {0}")]
    LoadFailure(String),

    /// Text extraction failed for a page
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// No viewer instance is loaded
    #[error("No document loaded")]
    NoActiveViewer,

    /// Viewer or editor operation failed
    #[error("Viewer operation failed: {0}")]
    Operation(String),

    #[error("Invalid link: {0}")]
    InvalidLink(#[from] FolioError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
