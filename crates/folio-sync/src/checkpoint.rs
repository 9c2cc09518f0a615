//! Acknowledgement checkpoint for replication.
//!
//! Records the highest local change log sequence a peer has acknowledged so
//! that a reconnect resumes pushing after it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Checkpoint key in the store's checkpoints column family
pub const SYNC_CHECKPOINT_KEY: &str = "sync";

/// Persisted replication progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncCheckpoint {
    /// Highest local sequence acknowledged by the peer
    pub acked_sequence: u64,

    /// Total local changes pushed
    pub pushed_count: u64,

    /// Total peer changes received
    pub pulled_count: u64,

    /// Last completed sync round (milliseconds since epoch)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_synced_at: DateTime<Utc>,
}

impl Default for SyncCheckpoint {
    fn default() -> Self {
        Self {
            acked_sequence: 0,
            pushed_count: 0,
            pulled_count: 0,
            last_synced_at: Utc::now(),
        }
    }
}

impl SyncCheckpoint {
    /// Record a push acknowledgement.
    pub fn acknowledge(&mut self, sequence: u64, pushed: u64) {
        self.acked_sequence = self.acked_sequence.max(sequence);
        self.pushed_count += pushed;
    }

    /// Record a completed pull.
    pub fn record_pull(&mut self, pulled: u64) {
        self.pulled_count += pulled;
        self.last_synced_at = Utc::now();
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SyncError> {
        serde_json::to_vec(self).map_err(SyncError::from)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SyncError> {
        serde_json::from_slice(bytes).map_err(SyncError::from)
    }
}
