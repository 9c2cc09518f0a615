//! Search error types.

use folio_storage::StorageError;
use thiserror::Error;

/// Errors that can occur during search operations.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Tantivy index error
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Schema mismatch
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A hit whose fragment or document no longer exists in the store
    #[error("Stale reference: {0}")]
    StaleReference(String),

    /// No index has been built yet
    #[error("Search index not ready")]
    NotReady,
}
