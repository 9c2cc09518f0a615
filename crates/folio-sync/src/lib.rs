//! Replication of the local change log with a remote peer.
//!
//! The [`SyncCoordinator`] drives an opaque [`SyncChannel`]: on connect it
//! pushes unacknowledged local changes in log order, then applies peer
//! changes to the store field by field, last writer wins. Peer changes are
//! never re-logged, so nothing echoes back.

pub mod channel;
pub mod checkpoint;
pub mod coordinator;
pub mod error;
pub mod mock;

pub use channel::SyncChannel;
pub use checkpoint::SyncCheckpoint;
pub use coordinator::{SyncCoordinator, SyncReport};
pub use error::SyncError;
pub use mock::{MockSyncChannel, MockSyncHub};
