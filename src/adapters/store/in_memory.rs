//! In-memory snapshot store for testing.
//!
//! # Security Note
//!
//! This adapter is for **testing only**: it panics on poisoned locks and
//! keeps everything in process memory. Production deployments use the
//! Redis adapter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::foundation::SessionId;
use crate::domain::whiteboard::WhiteboardSnapshot;
use crate::ports::{SnapshotStore, SnapshotStoreError};

/// In-memory snapshot store with failure injection.
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<SessionId, WhiteboardSnapshot>>,
    unavailable: AtomicBool,
}

impl InMemorySnapshotStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent call fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of rooms with a stored snapshot.
    pub fn room_count(&self) -> usize {
        self.snapshots
            .read()
            .expect("InMemorySnapshotStore: lock poisoned")
            .len()
    }

    fn ensure_available(&self) -> Result<(), SnapshotStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(SnapshotStoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

impl Default for InMemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn put(&self, snapshot: &WhiteboardSnapshot) -> Result<(), SnapshotStoreError> {
        self.ensure_available()?;
        self.snapshots
            .write()
            .expect("InMemorySnapshotStore: write lock poisoned")
            .insert(snapshot.room_id, snapshot.clone());
        Ok(())
    }

    async fn get(
        &self,
        room_id: &SessionId,
    ) -> Result<Option<WhiteboardSnapshot>, SnapshotStoreError> {
        self.ensure_available()?;
        Ok(self
            .snapshots
            .read()
            .expect("InMemorySnapshotStore: lock poisoned")
            .get(room_id)
            .cloned())
    }
}
