//! Transport seam for replication.

use async_trait::async_trait;

use folio_types::{ChangeEntry, RemoteChange};

use crate::error::SyncError;

/// Opaque bidirectional channel to a remote replica.
///
/// Implementations report transport failures as
/// [`SyncError::ConnectionFailed`].
#[async_trait]
pub trait SyncChannel: Send + Sync {
    /// Open the channel to `endpoint`, announcing the local replica id.
    async fn open(&self, endpoint: &str, replica_id: &str) -> Result<(), SyncError>;

    /// Send local changes in log order.
    ///
    /// Returns the highest sequence the peer acknowledged.
    async fn push(&self, changes: &[ChangeEntry]) -> Result<u64, SyncError>;

    /// Receive changes produced by other replicas since the last pull.
    async fn pull(&self) -> Result<Vec<RemoteChange>, SyncError>;

    /// Close the channel.
    async fn close(&self) -> Result<(), SyncError>;
}
