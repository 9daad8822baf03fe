//! SnapshotStore port - durable key-value store for whiteboard snapshots.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::SessionId;
use crate::domain::whiteboard::WhiteboardSnapshot;

/// Errors from the snapshot store.
#[derive(Debug, Error)]
pub enum SnapshotStoreError {
    /// Store unreachable. Transient; callers degrade to delivery-only.
    #[error("snapshot store unavailable: {0}")]
    Unavailable(String),

    /// Stored value could not be decoded.
    #[error("stored snapshot is corrupt: {0}")]
    Corrupt(String),
}

/// Durable store holding the single current snapshot per room.
///
/// Implementations must ensure:
/// - `put` overwrites unconditionally (last-write-wins by arrival order at
///   the store, no merge)
/// - `get` returns the most recently acknowledged write
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Replace the room's current snapshot.
    async fn put(&self, snapshot: &WhiteboardSnapshot) -> Result<(), SnapshotStoreError>;

    /// Fetch the room's current snapshot, or `None` if nothing was ever
    /// written.
    async fn get(&self, room_id: &SessionId) -> Result<Option<WhiteboardSnapshot>, SnapshotStoreError>;
}
