//! MessageBus port - uniform contract over the pub/sub backends.
//!
//! Two third-party providers implement this trait; which one is active is
//! decided by configuration at startup. Relay logic never branches on the
//! concrete backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::channels::ChannelName;
use crate::domain::foundation::{Role, SocketId, UserId};

/// Errors publishing an event to the bus.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Backend unreachable or timed out. Transient; the adapter does not
    /// retry — retry policy belongs to the caller, and duplicates are safe
    /// because consumers are idempotent.
    #[error("message bus backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Backend accepted the connection but rejected the request.
    #[error("publish rejected by backend: {0}")]
    Rejected(String),

    /// Payload could not be encoded for the wire.
    #[error("payload serialization failed: {0}")]
    Serialization(String),
}

/// Errors authorizing a channel subscription.
#[derive(Debug, Error)]
pub enum SubscriptionAuthError {
    /// Channel's visibility class does not admit this request.
    #[error("subscription not authorized: {0}")]
    Forbidden(String),

    /// Malformed handshake request.
    #[error("invalid subscription request: {0}")]
    Invalid(String),
}

/// Authenticated identity attached to a presence-channel member.
///
/// This is exactly the payload the bus exposes to other subscribers when
/// membership changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceMember {
    pub user_id: UserId,
    pub role: Role,
}

/// One client's request to subscribe to a protected channel.
#[derive(Debug, Clone)]
pub struct SubscriptionRequest {
    /// Bus-assigned connection identifier.
    pub socket_id: SocketId,
    /// Channel the client wants to join.
    pub channel: ChannelName,
}

/// Uniform publish contract over the concrete pub/sub backends.
///
/// Implementations must ensure:
/// - Delivery is at-least-once; duplicates are possible and permitted
/// - A publish is fire-and-forget with a bounded timeout; a timeout is an
///   error, never a silent retry
/// - No local state beyond connection handles
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a named event on a channel.
    async fn publish(
        &self,
        channel: &ChannelName,
        event: &str,
        payload: &serde_json::Value,
    ) -> Result<(), PublishError>;

    /// Produce the backend-specific handshake response that authorizes the
    /// requesting socket to subscribe to a presence or private channel.
    ///
    /// Membership itself has already been proven by the caller; this method
    /// only signs. Public channels need no authorization and are rejected
    /// as `Invalid`.
    fn authorize_subscription(
        &self,
        request: &SubscriptionRequest,
        member: &PresenceMember,
    ) -> Result<serde_json::Value, SubscriptionAuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn MessageBus) {}

    #[test]
    fn presence_member_serializes_identity_payload() {
        let member = PresenceMember {
            user_id: UserId::new("user-1").unwrap(),
            role: Role::Student,
        };
        let json = serde_json::to_value(&member).unwrap();
        assert_eq!(json["user_id"], "user-1");
        assert_eq!(json["role"], "student");
    }
}
