//! Error types shared by the folio crates.

use thiserror::Error;

/// Errors raised while building or parsing shared domain values.
#[derive(Debug, Error)]
pub enum FolioError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
