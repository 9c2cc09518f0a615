//! Storage layer for folio.
//!
//! Provides RocksDB-backed storage with:
//! - Column family isolation for documents, blobs, fragments and the change log
//! - Atomic writes via WriteBatch (data + field stamps + change log entry)
//! - Partial-merge document updates
//! - Snapshot-consistent multi-column reads
//! - Field-level last-writer-wins application of peer changes

pub mod column_families;
pub mod db;
pub mod error;
pub mod keys;
pub mod stamps;

pub use db::{DocumentMeta, RemoteApplyOutcome, Storage, StorageStats};
pub use error::StorageError;
pub use keys::{ChangeKey, CheckpointKey, DocumentKey, FragmentKey};
pub use stamps::{FieldStamps, Stamp};
