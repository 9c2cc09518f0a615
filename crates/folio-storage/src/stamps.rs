//! Field stamps for last-writer-wins merging.
//!
//! Every write to a document field records the log position and origin
//! replica that produced it. An incoming peer change replaces a field only
//! when its stamp orders after the stored one; ties on position are broken
//! by origin id so that every replica picks the same winner.

use std::collections::BTreeMap;

use folio_types::DocumentField;
use serde::{Deserialize, Serialize};

/// Position of a write in the replicated history.
///
/// Ordered by position, then origin.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Stamp {
    pub position: u64,
    pub origin: String,
}

impl Stamp {
    pub fn new(position: u64, origin: impl Into<String>) -> Self {
        Self {
            position,
            origin: origin.into(),
        }
    }
}

/// Stamps of a single document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldStamps {
    #[serde(default)]
    pub fields: BTreeMap<DocumentField, Stamp>,

    /// Set once the document has been deleted; blocks older writes from
    /// resurrecting it.
    #[serde(default)]
    pub deleted: Option<Stamp>,
}

impl FieldStamps {
    /// Whether a write stamped `stamp` replaces the stored value of `field`.
    pub fn accepts(&self, field: DocumentField, stamp: &Stamp) -> bool {
        self.fields.get(&field).map_or(true, |current| stamp > current)
    }

    /// Whether `stamp` orders after every write recorded for the document,
    /// including its deletion.
    pub fn dominated_by(&self, stamp: &Stamp) -> bool {
        self.latest().map_or(true, |latest| stamp > latest)
    }

    pub fn latest(&self) -> Option<&Stamp> {
        self.fields.values().chain(self.deleted.iter()).max()
    }

    pub fn record(&mut self, fields: &[DocumentField], stamp: &Stamp) {
        for field in fields {
            self.fields.insert(*field, stamp.clone());
        }
    }

    pub fn mark_deleted(&mut self, stamp: Stamp) {
        self.fields.clear();
        if self.deleted.as_ref().map_or(true, |d| &stamp > d) {
            self.deleted = Some(stamp);
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
