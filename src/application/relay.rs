//! SignalRelay - peer-targeted relay for connection negotiation.
//!
//! Verifies both ends of an envelope against live session state, then
//! republishes the signal on the session's presence channel. The channel
//! broadcast reaches every subscriber; the payload's `target` field lets
//! everyone but the addressed peer ignore it.
//!
//! The relay only forwards: it never deduplicates, reorders, or batches,
//! so it can never be the cause of a semantically unsafe duplicate.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::channels;
use crate::domain::foundation::{SessionId, Timestamp, UserId};
use crate::domain::session::SessionError;
use crate::domain::signaling::SignalEnvelope;
use crate::ports::{MessageBus, PublishError, SessionRegistry};

use super::events;

/// Errors relaying a signal.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("session not found: {0}")]
    UnknownSession(SessionId),

    #[error("session has expired")]
    SessionExpired,

    #[error("user {0} is not a participant of the session")]
    UnknownParticipant(UserId),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl From<SessionError> for RelayError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => RelayError::UnknownSession(id),
            SessionError::UnknownParticipant(user_id) => RelayError::UnknownParticipant(user_id),
            // Remaining session errors only arise from expiry here.
            _ => RelayError::SessionExpired,
        }
    }
}

/// Relays signaling envelopes to their addressed peer.
pub struct SignalRelay {
    registry: Arc<dyn SessionRegistry>,
    bus: Arc<dyn MessageBus>,
}

impl SignalRelay {
    pub fn new(registry: Arc<dyn SessionRegistry>, bus: Arc<dyn MessageBus>) -> Self {
        Self { registry, bus }
    }

    /// Relay one envelope.
    ///
    /// 1. Resolve the session's presence channel.
    /// 2. Verify sender and target are current participants of a
    ///    non-expired session.
    /// 3. Publish the `signal` event on that channel.
    ///
    /// Relaying counts as sender activity for idle-timeout purposes.
    ///
    /// # Errors
    ///
    /// - `UnknownSession` / `SessionExpired` / `UnknownParticipant` when
    ///   verification fails; the envelope is dropped, never queued
    /// - `Publish` when the bus rejects or times out; the caller may
    ///   re-publish explicitly, which is safe because consumers are
    ///   idempotent
    pub async fn relay(&self, envelope: SignalEnvelope) -> Result<(), RelayError> {
        let channel = channels::session_channel(&envelope.session_id);

        let handle = self
            .registry
            .get(&envelope.session_id)
            .await
            .ok_or(RelayError::UnknownSession(envelope.session_id))?;

        // Verify and record activity under the session lock, then release
        // it before going to the network.
        {
            let now = Timestamp::now();
            let mut session = handle.write().await;
            session.verify_route(&envelope.sender_id, &envelope.target_id, &now)?;
            session.record_activity(&envelope.sender_id, now);
        }

        let payload = serde_json::to_value(envelope.to_broadcast())
            .map_err(|e| PublishError::Serialization(e.to_string()))?;

        self.bus.publish(&channel, events::SIGNAL, &payload).await?;

        tracing::debug!(
            session_id = %envelope.session_id,
            sender = %envelope.sender_id,
            target = %envelope.target_id,
            is_return = envelope.is_return_signal,
            "Relayed signal"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::bus::InMemoryBus;
    use crate::adapters::registry::InMemorySessionRegistry;
    use crate::domain::foundation::{ClassroomId, Role};
    use crate::domain::session::LiveSession;
    use serde_json::json;

    fn user(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    async fn session_with_participants(
        registry: &InMemorySessionRegistry,
        participants: &[&str],
    ) -> SessionId {
        let session_id = SessionId::new();
        let mut session = LiveSession::new(session_id, user("teacher-1"), ClassroomId::new());
        for p in participants {
            session
                .join(user(p), Role::Student, Timestamp::now(), None)
                .unwrap();
        }
        registry.insert(session).await;
        session_id
    }

    fn envelope(session_id: SessionId, sender: &str, target: &str) -> SignalEnvelope {
        SignalEnvelope {
            session_id,
            sender_id: user(sender),
            target_id: user(target),
            signal: json!({"type": "offer", "sdp": "v=0"}),
            is_return_signal: false,
        }
    }

    #[tokio::test]
    async fn relay_publishes_on_session_channel() {
        let registry = Arc::new(InMemorySessionRegistry::new());
        let bus = Arc::new(InMemoryBus::new());
        let session_id = session_with_participants(&registry, &["alice", "bob"]).await;

        let relay = SignalRelay::new(registry, bus.clone());
        relay.relay(envelope(session_id, "alice", "bob")).await.unwrap();

        let published = bus.published();
        assert_eq!(published.len(), 1);
        assert_eq!(
            published[0].channel,
            channels::session_channel(&session_id)
        );
        assert_eq!(published[0].event, events::SIGNAL);
        assert_eq!(published[0].payload["target"], "bob");
        assert_eq!(published[0].payload["senderId"], "alice");
    }

    #[tokio::test]
    async fn relay_rejects_unknown_target() {
        let registry = Arc::new(InMemorySessionRegistry::new());
        let bus = Arc::new(InMemoryBus::new());
        let session_id = session_with_participants(&registry, &["alice"]).await;

        let relay = SignalRelay::new(registry, bus.clone());
        let result = relay.relay(envelope(session_id, "alice", "bob")).await;

        assert!(matches!(result, Err(RelayError::UnknownParticipant(u)) if u.as_str() == "bob"));
        assert_eq!(bus.published().len(), 0);
    }

    #[tokio::test]
    async fn relay_rejects_unknown_sender() {
        let registry = Arc::new(InMemorySessionRegistry::new());
        let bus = Arc::new(InMemoryBus::new());
        let session_id = session_with_participants(&registry, &["bob"]).await;

        let relay = SignalRelay::new(registry, bus.clone());
        let result = relay.relay(envelope(session_id, "alice", "bob")).await;

        assert!(matches!(result, Err(RelayError::UnknownParticipant(u)) if u.as_str() == "alice"));
    }

    #[tokio::test]
    async fn relay_rejects_unknown_session() {
        let registry = Arc::new(InMemorySessionRegistry::new());
        let bus = Arc::new(InMemoryBus::new());

        let relay = SignalRelay::new(registry, bus);
        let result = relay.relay(envelope(SessionId::new(), "alice", "bob")).await;

        assert!(matches!(result, Err(RelayError::UnknownSession(_))));
    }

    #[tokio::test]
    async fn relay_rejects_expired_session() {
        let registry = Arc::new(InMemorySessionRegistry::new());
        let bus = Arc::new(InMemoryBus::new());
        let session_id = session_with_participants(&registry, &["alice", "bob"]).await;

        {
            let handle = registry.get(&session_id).await.unwrap();
            handle
                .write()
                .await
                .end(Timestamp::now().minus_secs(60))
                .unwrap();
        }

        let relay = SignalRelay::new(registry, bus.clone());
        let result = relay.relay(envelope(session_id, "alice", "bob")).await;

        assert!(matches!(result, Err(RelayError::SessionExpired)));
        assert_eq!(bus.published().len(), 0);
    }

    #[tokio::test]
    async fn relay_surfaces_bus_failure_without_retry() {
        let registry = Arc::new(InMemorySessionRegistry::new());
        let bus = Arc::new(InMemoryBus::new());
        bus.set_unavailable(true);
        let session_id = session_with_participants(&registry, &["alice", "bob"]).await;

        let relay = SignalRelay::new(registry, bus.clone());
        let result = relay.relay(envelope(session_id, "alice", "bob")).await;

        assert!(matches!(result, Err(RelayError::Publish(_))));
        assert_eq!(bus.attempted_count(), 1);
    }

    #[tokio::test]
    async fn relay_records_sender_activity() {
        let registry = Arc::new(InMemorySessionRegistry::new());
        let bus = Arc::new(InMemoryBus::new());
        let session_id = session_with_participants(&registry, &["alice", "bob"]).await;

        let before = {
            let handle = registry.get(&session_id).await.unwrap();
            let session = handle.read().await;
            *session.participant(&user("alice")).unwrap().last_activity()
        };

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let relay = SignalRelay::new(registry.clone(), bus);
        relay.relay(envelope(session_id, "alice", "bob")).await.unwrap();

        let handle = registry.get(&session_id).await.unwrap();
        let session = handle.read().await;
        assert!(session
            .participant(&user("alice"))
            .unwrap()
            .last_activity()
            .is_after(&before));
    }
}
