//! WhiteboardSync - snapshot persistence and fan-out.
//!
//! An update runs through two decoupled stages connected by an internal
//! queue:
//!
//! ```text
//! publish_update ──► SnapshotStore (durable, last-write-wins)
//!        │
//!        └────────► fan-out queue ──► SnapshotBridge ──► presence channel
//! ```
//!
//! Either stage can fail independently: a store outage must not block
//! delivery to already-connected peers, and a bridge/bus outage must not
//! block persistence. The store write happens-before the fan-out enqueue,
//! so a delivered event never precedes its durable snapshot.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::domain::channels;
use crate::domain::foundation::{SessionId, Timestamp, UserId};
use crate::domain::session::SessionError;
use crate::domain::whiteboard::WhiteboardSnapshot;
use crate::ports::{MessageBus, SessionRegistry, SnapshotStore, SnapshotStoreError};

use super::events;

/// Errors from whiteboard operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("session not found: {0}")]
    UnknownSession(SessionId),

    #[error("session has expired")]
    SessionExpired,

    #[error("user {0} is not a participant of the session")]
    UnknownParticipant(UserId),

    #[error("snapshot store unavailable: {0}")]
    StoreUnavailable(String),

    /// Both persistence and delivery failed; the update was lost.
    #[error("whiteboard update could neither be persisted nor delivered")]
    Unavailable,
}

impl From<SessionError> for SyncError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => SyncError::UnknownSession(id),
            SessionError::UnknownParticipant(user_id) => SyncError::UnknownParticipant(user_id),
            _ => SyncError::SessionExpired,
        }
    }
}

/// Outcome of an accepted update.
///
/// `persisted: false` is the delivery-only degradation: the update reached
/// connected peers but the pull path will serve the previous snapshot
/// until a later write succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateReceipt {
    pub persisted: bool,
    pub queued: bool,
}

/// Owns the room's current snapshot and hands updates to the bridge.
pub struct WhiteboardSync {
    registry: Arc<dyn SessionRegistry>,
    store: Arc<dyn SnapshotStore>,
    fanout: mpsc::Sender<WhiteboardSnapshot>,
}

impl WhiteboardSync {
    pub fn new(
        registry: Arc<dyn SessionRegistry>,
        store: Arc<dyn SnapshotStore>,
        fanout: mpsc::Sender<WhiteboardSnapshot>,
    ) -> Self {
        Self {
            registry,
            store,
            fanout,
        }
    }

    /// Accept a whiteboard update from a participant.
    ///
    /// Persists the snapshot (overwrite semantics), then enqueues fan-out.
    /// Each stage degrades independently; only both failing is an error.
    ///
    /// # Errors
    ///
    /// - `UnknownSession` / `SessionExpired` / `UnknownParticipant` when
    ///   the room rejects the sender
    /// - `Unavailable` when neither stage accepted the update
    pub async fn publish_update(
        &self,
        room_id: SessionId,
        content: serde_json::Value,
        sender_id: UserId,
    ) -> Result<UpdateReceipt, SyncError> {
        let handle = self
            .registry
            .get(&room_id)
            .await
            .ok_or(SyncError::UnknownSession(room_id))?;

        {
            let now = Timestamp::now();
            let mut session = handle.write().await;
            session.ensure_live(&now)?;
            if !session.is_participant(&sender_id) {
                return Err(SyncError::UnknownParticipant(sender_id));
            }
            session.record_activity(&sender_id, now);
        }

        let snapshot = WhiteboardSnapshot::new(room_id, content, sender_id);

        let persisted = match self.store.put(&snapshot).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    room_id = %room_id,
                    error = %e,
                    "Snapshot persistence failed, degrading to delivery-only"
                );
                false
            }
        };

        let queued = match self.fanout.send(snapshot).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    room_id = %room_id,
                    error = %e,
                    "Fan-out queue closed, update persisted but not delivered"
                );
                false
            }
        };

        if !persisted && !queued {
            return Err(SyncError::Unavailable);
        }

        Ok(UpdateReceipt { persisted, queued })
    }

    /// Pull path for late joiners and reconnects.
    ///
    /// Returns `None` if no snapshot has ever been written for the room.
    pub async fn fetch_latest(
        &self,
        room_id: &SessionId,
    ) -> Result<Option<WhiteboardSnapshot>, SyncError> {
        match self.store.get(room_id).await {
            Ok(snapshot) => Ok(snapshot),
            Err(SnapshotStoreError::Unavailable(msg)) => Err(SyncError::StoreUnavailable(msg)),
            Err(SnapshotStoreError::Corrupt(msg)) => {
                tracing::error!(room_id = %room_id, error = %msg, "Dropping corrupt snapshot");
                Ok(None)
            }
        }
    }
}

/// Second stage of the store-to-bus bridge: drains the fan-out queue onto
/// the live presence channel.
pub struct SnapshotBridge {
    bus: Arc<dyn MessageBus>,
    updates: mpsc::Receiver<WhiteboardSnapshot>,
}

impl SnapshotBridge {
    pub fn new(bus: Arc<dyn MessageBus>, updates: mpsc::Receiver<WhiteboardSnapshot>) -> Self {
        Self { bus, updates }
    }

    /// Run the bridge until shutdown is signalled or the queue closes.
    ///
    /// Per-update publish failures are logged and skipped; one bad update
    /// never stops the bridge.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Snapshot bridge shutting down");
                        return;
                    }
                }
                next = self.updates.recv() => {
                    match next {
                        Some(snapshot) => self.relay_one(snapshot).await,
                        None => {
                            tracing::info!("Fan-out queue closed, snapshot bridge stopping");
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Process exactly one queued update (used by tests).
    pub async fn relay_next(&mut self) -> bool {
        match self.updates.recv().await {
            Some(snapshot) => {
                self.relay_one(snapshot).await;
                true
            }
            None => false,
        }
    }

    async fn relay_one(&self, snapshot: WhiteboardSnapshot) {
        let channel = channels::session_channel(&snapshot.room_id);
        let payload = match serde_json::to_value(snapshot.to_broadcast()) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(room_id = %snapshot.room_id, error = %e, "Unserializable snapshot");
                return;
            }
        };

        if let Err(e) = self
            .bus
            .publish(&channel, events::WHITEBOARD_UPDATED, &payload)
            .await
        {
            tracing::warn!(
                room_id = %snapshot.room_id,
                error = %e,
                "Whiteboard fan-out publish failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::bus::InMemoryBus;
    use crate::adapters::registry::InMemorySessionRegistry;
    use crate::adapters::store::InMemorySnapshotStore;
    use crate::domain::foundation::{ClassroomId, Role};
    use crate::domain::session::LiveSession;
    use serde_json::json;

    fn user(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    struct Fixture {
        registry: Arc<InMemorySessionRegistry>,
        store: Arc<InMemorySnapshotStore>,
        bus: Arc<InMemoryBus>,
        sync: WhiteboardSync,
        bridge: SnapshotBridge,
        room_id: SessionId,
    }

    async fn fixture() -> Fixture {
        let registry = Arc::new(InMemorySessionRegistry::new());
        let store = Arc::new(InMemorySnapshotStore::new());
        let bus = Arc::new(InMemoryBus::new());
        let (tx, rx) = mpsc::channel(16);

        let room_id = SessionId::new();
        let mut session = LiveSession::new(room_id, user("teacher-1"), ClassroomId::new());
        session
            .join(user("alice"), Role::Student, Timestamp::now(), None)
            .unwrap();
        registry.insert(session).await;

        Fixture {
            sync: WhiteboardSync::new(registry.clone(), store.clone(), tx),
            bridge: SnapshotBridge::new(bus.clone(), rx),
            registry,
            store,
            bus,
            room_id,
        }
    }

    #[tokio::test]
    async fn fetch_latest_is_none_before_first_write() {
        let f = fixture().await;
        assert!(f.sync.fetch_latest(&f.room_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_persists_and_queues() {
        let mut f = fixture().await;

        let receipt = f
            .sync
            .publish_update(f.room_id, json!({"strokes": [1]}), user("alice"))
            .await
            .unwrap();
        assert_eq!(
            receipt,
            UpdateReceipt {
                persisted: true,
                queued: true
            }
        );

        let latest = f.sync.fetch_latest(&f.room_id).await.unwrap().unwrap();
        assert_eq!(latest.content, json!({"strokes": [1]}));

        // Bridge delivers the queued update to the live channel.
        assert!(f.bridge.relay_next().await);
        let published = f.bus.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].event, events::WHITEBOARD_UPDATED);
        assert_eq!(published[0].payload["senderId"], "alice");
        assert!(published[0].payload.get("updatedAt").is_some());
    }

    #[tokio::test]
    async fn last_write_wins_by_arrival_order() {
        let f = fixture().await;

        f.sync
            .publish_update(f.room_id, json!({"rev": 1}), user("alice"))
            .await
            .unwrap();
        f.sync
            .publish_update(f.room_id, json!({"rev": 2}), user("alice"))
            .await
            .unwrap();

        let latest = f.sync.fetch_latest(&f.room_id).await.unwrap().unwrap();
        assert_eq!(latest.content, json!({"rev": 2}));
    }

    #[tokio::test]
    async fn store_outage_degrades_to_delivery_only() {
        let mut f = fixture().await;
        f.store.set_unavailable(true);

        let receipt = f
            .sync
            .publish_update(f.room_id, json!({"rev": 1}), user("alice"))
            .await
            .unwrap();
        assert_eq!(
            receipt,
            UpdateReceipt {
                persisted: false,
                queued: true
            }
        );

        // Delivery still happens.
        assert!(f.bridge.relay_next().await);
        assert_eq!(f.bus.published().len(), 1);
    }

    #[tokio::test]
    async fn bridge_outage_still_persists() {
        let f = fixture().await;
        drop(f.bridge); // closes the queue

        let receipt = f
            .sync
            .publish_update(f.room_id, json!({"rev": 1}), user("alice"))
            .await
            .unwrap();
        assert_eq!(
            receipt,
            UpdateReceipt {
                persisted: true,
                queued: false
            }
        );

        let latest = f.sync.fetch_latest(&f.room_id).await.unwrap().unwrap();
        assert_eq!(latest.content, json!({"rev": 1}));
    }

    #[tokio::test]
    async fn both_stages_failing_is_an_error() {
        let f = fixture().await;
        f.store.set_unavailable(true);
        drop(f.bridge);

        let result = f
            .sync
            .publish_update(f.room_id, json!({"rev": 1}), user("alice"))
            .await;
        assert!(matches!(result, Err(SyncError::Unavailable)));
    }

    #[tokio::test]
    async fn update_rejects_non_participant() {
        let f = fixture().await;
        let result = f
            .sync
            .publish_update(f.room_id, json!({}), user("mallory"))
            .await;
        assert!(matches!(result, Err(SyncError::UnknownParticipant(_))));
    }

    #[tokio::test]
    async fn update_rejects_expired_room() {
        let f = fixture().await;
        {
            let handle = f.registry.get(&f.room_id).await.unwrap();
            handle
                .write()
                .await
                .end(Timestamp::now().minus_secs(60))
                .unwrap();
        }

        let result = f
            .sync
            .publish_update(f.room_id, json!({}), user("alice"))
            .await;
        assert!(matches!(result, Err(SyncError::SessionExpired)));
    }

    #[tokio::test]
    async fn bridge_survives_publish_failure() {
        let mut f = fixture().await;
        f.bus.set_unavailable(true);

        f.sync
            .publish_update(f.room_id, json!({"rev": 1}), user("alice"))
            .await
            .unwrap();
        f.sync
            .publish_update(f.room_id, json!({"rev": 2}), user("alice"))
            .await
            .unwrap();

        // First relay fails against the bus but does not stop the bridge.
        assert!(f.bridge.relay_next().await);
        f.bus.set_unavailable(false);
        assert!(f.bridge.relay_next().await);

        assert_eq!(f.bus.published().len(), 1);
        assert_eq!(f.bus.published()[0].payload["snapshot"], json!({"rev": 2}));
    }

    #[tokio::test]
    async fn bridge_run_stops_on_shutdown_signal() {
        let f = fixture().await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(f.bridge.run(shutdown_rx));
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn fetch_latest_surfaces_store_outage() {
        let f = fixture().await;
        f.store.set_unavailable(true);
        let result = f.sync.fetch_latest(&f.room_id).await;
        assert!(matches!(result, Err(SyncError::StoreUnavailable(_))));
    }
}
