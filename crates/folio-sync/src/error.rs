//! Error types for sync operations.

use folio_storage::StorageError;
use thiserror::Error;

/// Errors that can occur while replicating
#[derive(Error, Debug)]
pub enum SyncError {
    /// Transport failed to open or dropped mid-sync. Local state stays usable.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Operation requires an open connection
    #[error("Not connected")]
    NotConnected,

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Checkpoint serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}
