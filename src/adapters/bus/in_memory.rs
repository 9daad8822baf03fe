//! In-memory message bus implementation for testing.
//!
//! Provides synchronous, deterministic publishing for unit tests, plus a
//! capture buffer for assertions.
//!
//! # Security Note
//!
//! This adapter is for **testing only** and should not be used in
//! production. It uses `.expect()` on lock operations which will panic if
//! locks are poisoned. Production deployments use the Pusher or Ably
//! adapter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::broadcast;

use crate::domain::channels::{ChannelName, Visibility};
use crate::ports::{
    MessageBus, PresenceMember, PublishError, SubscriptionAuthError, SubscriptionRequest,
};

/// One captured publish.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub channel: ChannelName,
    pub event: String,
    pub payload: serde_json::Value,
}

/// In-memory message bus for testing.
///
/// Features:
/// - Capture of every successful publish for assertions
/// - Broadcast delivery to per-channel test subscribers
/// - Failure injection via [`set_unavailable`](Self::set_unavailable)
///
/// # Panics
///
/// Methods may panic if internal locks are poisoned. This is acceptable
/// for test code but this adapter should NOT be used in production.
pub struct InMemoryBus {
    published: RwLock<Vec<PublishedMessage>>,
    subscribers: RwLock<HashMap<ChannelName, broadcast::Sender<PublishedMessage>>>,
    unavailable: AtomicBool,
    attempted: AtomicUsize,
}

impl InMemoryBus {
    /// Creates a new empty bus.
    pub fn new() -> Self {
        Self {
            published: RwLock::new(Vec::new()),
            subscribers: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            attempted: AtomicUsize::new(0),
        }
    }

    /// Makes every subsequent publish fail with `BackendUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Subscribe to a channel as a test client.
    pub fn subscribe(&self, channel: &ChannelName) -> broadcast::Receiver<PublishedMessage> {
        let mut subscribers = self
            .subscribers
            .write()
            .expect("InMemoryBus: subscribers lock poisoned");
        subscribers
            .entry(channel.clone())
            .or_insert_with(|| broadcast::channel(64).0)
            .subscribe()
    }

    // === Test Helpers ===

    /// Returns all successfully published messages.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published
            .read()
            .expect("InMemoryBus: published lock poisoned")
            .clone()
    }

    /// Returns messages published on one channel.
    pub fn published_on(&self, channel: &ChannelName) -> Vec<PublishedMessage> {
        self.published()
            .into_iter()
            .filter(|m| &m.channel == channel)
            .collect()
    }

    /// Checks if an event with the given name was published.
    pub fn has_event(&self, event: &str) -> bool {
        self.published().iter().any(|m| m.event == event)
    }

    /// Number of publish attempts, including failed ones.
    pub fn attempted_count(&self) -> usize {
        self.attempted.load(Ordering::SeqCst)
    }

    /// Clears captured messages (for test isolation).
    pub fn clear(&self) {
        self.published
            .write()
            .expect("InMemoryBus: published write lock poisoned")
            .clear();
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(
        &self,
        channel: &ChannelName,
        event: &str,
        payload: &serde_json::Value,
    ) -> Result<(), PublishError> {
        self.attempted.fetch_add(1, Ordering::SeqCst);

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PublishError::BackendUnavailable(
                "in-memory bus marked unavailable".to_string(),
            ));
        }

        let message = PublishedMessage {
            channel: channel.clone(),
            event: event.to_string(),
            payload: payload.clone(),
        };

        self.published
            .write()
            .expect("InMemoryBus: published write lock poisoned")
            .push(message.clone());

        let subscribers = self
            .subscribers
            .read()
            .expect("InMemoryBus: subscribers lock poisoned");
        if let Some(sender) = subscribers.get(channel) {
            // No receivers is fine.
            let _ = sender.send(message);
        }

        Ok(())
    }

    fn authorize_subscription(
        &self,
        request: &SubscriptionRequest,
        member: &PresenceMember,
    ) -> Result<serde_json::Value, SubscriptionAuthError> {
        match request.channel.visibility() {
            Visibility::Public => Err(SubscriptionAuthError::Invalid(
                "public channels do not require authorization".to_string(),
            )),
            Visibility::Presence => Ok(json!({
                "auth": format!("test:{}", request.socket_id),
                "channel_data": serde_json::to_string(member)
                    .map_err(|e| SubscriptionAuthError::Invalid(e.to_string()))?,
            })),
            Visibility::PrivatePair => Ok(json!({
                "auth": format!("test:{}", request.socket_id),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::channels;
    use crate::domain::foundation::{Role, SessionId, SocketId, UserId};

    fn channel() -> ChannelName {
        channels::session_channel(&SessionId::new())
    }

    #[tokio::test]
    async fn publish_captures_message() {
        let bus = InMemoryBus::new();
        let ch = channel();

        bus.publish(&ch, "signal", &json!({"x": 1})).await.unwrap();

        assert_eq!(bus.published().len(), 1);
        assert!(bus.has_event("signal"));
        assert_eq!(bus.published_on(&ch).len(), 1);
    }

    #[tokio::test]
    async fn publish_delivers_to_subscribers() {
        let bus = InMemoryBus::new();
        let ch = channel();
        let mut rx = bus.subscribe(&ch);

        bus.publish(&ch, "signal", &json!({"x": 1})).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event, "signal");
    }

    #[tokio::test]
    async fn subscribers_only_see_their_channel() {
        let bus = InMemoryBus::new();
        let ch1 = channel();
        let ch2 = channel();
        let mut rx = bus.subscribe(&ch2);

        bus.publish(&ch1, "signal", &json!({})).await.unwrap();
        bus.publish(&ch2, "other", &json!({})).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event, "other");
    }

    #[tokio::test]
    async fn unavailable_bus_fails_publishes() {
        let bus = InMemoryBus::new();
        bus.set_unavailable(true);

        let result = bus.publish(&channel(), "signal", &json!({})).await;
        assert!(matches!(result, Err(PublishError::BackendUnavailable(_))));
        assert_eq!(bus.published().len(), 0);
        assert_eq!(bus.attempted_count(), 1);
    }

    #[test]
    fn presence_auth_includes_channel_data() {
        let bus = InMemoryBus::new();
        let request = SubscriptionRequest {
            socket_id: SocketId::new("1234.5678").unwrap(),
            channel: channel(),
        };
        let member = PresenceMember {
            user_id: UserId::new("user-1").unwrap(),
            role: Role::Student,
        };

        let auth = bus.authorize_subscription(&request, &member).unwrap();
        assert!(auth.get("channel_data").is_some());
    }

    #[test]
    fn public_channel_auth_is_invalid() {
        let bus = InMemoryBus::new();
        let request = SubscriptionRequest {
            socket_id: SocketId::new("1234.5678").unwrap(),
            channel: channels::classroom_channel(&crate::domain::foundation::ClassroomId::new()),
        };
        let member = PresenceMember {
            user_id: UserId::new("user-1").unwrap(),
            role: Role::Student,
        };

        assert!(bus.authorize_subscription(&request, &member).is_err());
    }
}
