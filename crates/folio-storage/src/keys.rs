//! Key encoding and decoding for storage layer.
//!
//! Documents and fragments are keyed by their id behind a type prefix so
//! that a single column family can also hold secondary indexes:
//! - `doc:{id}` / `filename:{filename}` in the documents CF
//! - `frag:{fragment_id}` / `doc:{document_id}:{fragment_id}` in the fragments CF
//!
//! Change log keys carry a zero-padded sequence so that lexicographic order
//! matches log order.

use crate::error::StorageError;

/// Key for document metadata
/// Format: doc:{id}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentKey {
    pub id: String,
}

impl DocumentKey {
    pub const PREFIX: &'static str = "doc:";

    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!("{}{}", Self::PREFIX, self.id).into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))?;
        let id = s
            .strip_prefix(Self::PREFIX)
            .ok_or_else(|| StorageError::Key(format!("Invalid document key format: {}", s)))?;
        Ok(Self::new(id))
    }

    /// Uniqueness index entry for a filename, stored next to the metadata.
    pub fn filename_index(filename: &str) -> Vec<u8> {
        format!("filename:{}", filename).into_bytes()
    }
}

/// Key for a stored text fragment
/// Format: frag:{fragment_id}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentKey {
    pub fragment_id: String,
}

impl FragmentKey {
    pub const PREFIX: &'static str = "frag:";

    pub fn new(fragment_id: impl Into<String>) -> Self {
        Self {
            fragment_id: fragment_id.into(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!("{}{}", Self::PREFIX, self.fragment_id).into_bytes()
    }

    /// Secondary index entry linking a document to one of its fragments.
    /// Format: doc:{document_id}:{fragment_id}
    pub fn document_index(document_id: &str, fragment_id: &str) -> Vec<u8> {
        format!("doc:{}:{}", document_id, fragment_id).into_bytes()
    }

    /// Prefix covering every index entry of a document.
    pub fn document_index_prefix(document_id: &str) -> Vec<u8> {
        format!("doc:{}:", document_id).into_bytes()
    }

    /// Extract the fragment id from an index key under `prefix`.
    ///
    /// Fragment ids never contain `:`, so a remainder that does belongs to
    /// a different document whose id shares the prefix.
    pub fn fragment_id_from_index<'a>(key: &'a [u8], prefix: &[u8]) -> Option<&'a str> {
        let rest = key.strip_prefix(prefix)?;
        let id = std::str::from_utf8(rest).ok()?;
        if id.is_empty() || id.contains(':') {
            None
        } else {
            Some(id)
        }
    }
}

/// Key for change log entries
/// Format: change:{sequence:020}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeKey {
    /// Monotonic log position
    pub sequence: u64,
}

impl ChangeKey {
    pub fn new(sequence: u64) -> Self {
        Self { sequence }
    }

    /// Encode key to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        format!("change:{:020}", self.sequence).into_bytes()
    }

    /// Decode key from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))?;

        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 2 || parts[0] != "change" {
            return Err(StorageError::Key(format!("Invalid change key format: {}", s)));
        }

        let sequence: u64 = parts[1]
            .parse()
            .map_err(|e| StorageError::Key(format!("Invalid sequence: {}", e)))?;

        Ok(Self { sequence })
    }
}

/// Key for checkpoint entries
/// Format: checkpoint:{name}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointKey {
    /// Checkpoint name (e.g., "log_head", "sync")
    pub name: String,
}

impl CheckpointKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!("checkpoint:{}", self.name).into_bytes()
    }
}
