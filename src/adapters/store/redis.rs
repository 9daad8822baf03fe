//! Redis implementation of the SnapshotStore port.
//!
//! One key per room holding the JSON-encoded current snapshot. Writes
//! overwrite unconditionally; last-write-wins is whatever order Redis
//! acknowledged.

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::config::RedisConfig;
use crate::domain::foundation::SessionId;
use crate::domain::whiteboard::WhiteboardSnapshot;
use crate::ports::{SnapshotStore, SnapshotStoreError};

/// Redis-backed whiteboard snapshot store.
#[derive(Clone)]
pub struct RedisSnapshotStore {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl RedisSnapshotStore {
    /// Connects to Redis using the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the server cannot be reached.
    pub async fn connect(config: &RedisConfig) -> Result<Self, SnapshotStoreError> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| SnapshotStoreError::Unavailable(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| SnapshotStoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            conn,
            ttl_secs: config.snapshot_ttl_secs,
        })
    }

    fn key(room_id: &SessionId) -> String {
        format!("whiteboard:snapshot:{}", room_id)
    }
}

#[async_trait]
impl SnapshotStore for RedisSnapshotStore {
    async fn put(&self, snapshot: &WhiteboardSnapshot) -> Result<(), SnapshotStoreError> {
        let value = serde_json::to_string(snapshot)
            .map_err(|e| SnapshotStoreError::Corrupt(e.to_string()))?;

        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(Self::key(&snapshot.room_id))
            .arg(value)
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| SnapshotStoreError::Unavailable(e.to_string()))?;

        Ok(())
    }

    async fn get(
        &self,
        room_id: &SessionId,
    ) -> Result<Option<WhiteboardSnapshot>, SnapshotStoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(Self::key(room_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| SnapshotStoreError::Unavailable(e.to_string()))?;

        match value {
            Some(raw) => {
                let snapshot = serde_json::from_str(&raw)
                    .map_err(|e| SnapshotStoreError::Corrupt(e.to_string()))?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }
}
