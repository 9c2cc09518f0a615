//! Sync status values reported by the sync coordinator.

use serde::{Deserialize, Serialize};

/// Connection status of the replication channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Connecting,
    Connected,
    #[default]
    Disconnected,
    Error,
    Syncing,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Connecting => write!(f, "connecting"),
            SyncStatus::Connected => write!(f, "connected"),
            SyncStatus::Disconnected => write!(f, "disconnected"),
            SyncStatus::Error => write!(f, "error"),
            SyncStatus::Syncing => write!(f, "syncing"),
        }
    }
}
