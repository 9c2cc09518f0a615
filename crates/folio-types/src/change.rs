//! Change log entries exchanged with sync peers.
//!
//! Every local document mutation appends a [`ChangeEntry`] to the store's
//! change log in the same write batch as the mutation itself. Peers deliver
//! [`RemoteChange`]s which are applied without being re-logged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::DocumentPatch;

/// Type of recorded mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Create => write!(f, "create"),
            ChangeKind::Update => write!(f, "update"),
            ChangeKind::Delete => write!(f, "delete"),
        }
    }
}

/// A locally recorded document mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// Log position, strictly increasing
    pub sequence: u64,

    /// Document the mutation applies to
    pub document_id: String,

    pub kind: ChangeKind,

    /// Values before the mutation (None for creates)
    #[serde(default)]
    pub old: Option<DocumentPatch>,

    /// Values after the mutation (None for deletes)
    #[serde(default)]
    pub new: Option<DocumentPatch>,

    /// Wall-clock time of the mutation (milliseconds since epoch for JSON compatibility)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub recorded_at: DateTime<Utc>,
}

impl ChangeEntry {
    pub fn create(sequence: u64, document_id: impl Into<String>, new: DocumentPatch) -> Self {
        Self {
            sequence,
            document_id: document_id.into(),
            kind: ChangeKind::Create,
            old: None,
            new: Some(new),
            recorded_at: Utc::now(),
        }
    }

    pub fn update(
        sequence: u64,
        document_id: impl Into<String>,
        old: DocumentPatch,
        new: DocumentPatch,
    ) -> Self {
        Self {
            sequence,
            document_id: document_id.into(),
            kind: ChangeKind::Update,
            old: Some(old),
            new: Some(new),
            recorded_at: Utc::now(),
        }
    }

    pub fn delete(sequence: u64, document_id: impl Into<String>, old: DocumentPatch) -> Self {
        Self {
            sequence,
            document_id: document_id.into(),
            kind: ChangeKind::Delete,
            old: Some(old),
            new: None,
            recorded_at: Utc::now(),
        }
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// A mutation delivered by a sync peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteChange {
    /// Identifier of the replica that produced the change
    pub origin: String,

    /// Log position on the producing replica
    pub position: u64,

    pub document_id: String,

    pub kind: ChangeKind,

    /// Field values carried by creates and updates
    #[serde(default)]
    pub patch: Option<DocumentPatch>,
}

impl RemoteChange {
    pub fn update(
        origin: impl Into<String>,
        position: u64,
        document_id: impl Into<String>,
        patch: DocumentPatch,
    ) -> Self {
        Self {
            origin: origin.into(),
            position,
            document_id: document_id.into(),
            kind: ChangeKind::Update,
            patch: Some(patch),
        }
    }

    pub fn create(
        origin: impl Into<String>,
        position: u64,
        document_id: impl Into<String>,
        patch: DocumentPatch,
    ) -> Self {
        Self {
            kind: ChangeKind::Create,
            ..Self::update(origin, position, document_id, patch)
        }
    }

    pub fn delete(origin: impl Into<String>, position: u64, document_id: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            position,
            document_id: document_id.into(),
            kind: ChangeKind::Delete,
            patch: None,
        }
    }

    /// The change as seen by a peer of the replica `origin` that logged `entry`.
    pub fn from_entry(origin: impl Into<String>, entry: &ChangeEntry) -> Self {
        Self {
            origin: origin.into(),
            position: entry.sequence,
            document_id: entry.document_id.clone(),
            kind: entry.kind,
            patch: entry.new.clone(),
        }
    }
}
