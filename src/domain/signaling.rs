//! Signaling envelope for peer-connection negotiation.
//!
//! The `signal` blob is the peer protocol's offer/answer/ICE data; this
//! layer forwards it uninspected.

use serde::{Deserialize, Serialize};

use super::foundation::{SessionId, UserId};

/// One inbound signaling request from a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEnvelope {
    /// Session whose presence channel carries the signal.
    pub session_id: SessionId,

    /// Authenticated sender.
    pub sender_id: UserId,

    /// Addressed peer. Must be a current participant of the same session.
    pub target_id: UserId,

    /// Opaque signaling payload.
    pub signal: serde_json::Value,

    /// Distinguishes answers from initial offers.
    pub is_return_signal: bool,
}

impl SignalEnvelope {
    /// Wire payload broadcast on the session channel.
    ///
    /// Delivery is a channel-level broadcast; the `target` field lets every
    /// other subscriber recognize the mismatch and ignore the event.
    pub fn to_broadcast(&self) -> SignalBroadcast {
        SignalBroadcast {
            sender_id: self.sender_id.clone(),
            target: self.target_id.clone(),
            signal: self.signal.clone(),
            is_return_signal: self.is_return_signal,
        }
    }
}

/// Event payload published for a relayed signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalBroadcast {
    pub sender_id: UserId,
    pub target: UserId,
    pub signal: serde_json::Value,
    pub is_return_signal: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn broadcast_preserves_targeting_fields() {
        let envelope = SignalEnvelope {
            session_id: SessionId::new(),
            sender_id: UserId::new("alice").unwrap(),
            target_id: UserId::new("bob").unwrap(),
            signal: json!({"type": "offer", "sdp": "v=0"}),
            is_return_signal: false,
        };

        let broadcast = envelope.to_broadcast();
        assert_eq!(broadcast.sender_id.as_str(), "alice");
        assert_eq!(broadcast.target.as_str(), "bob");
        assert_eq!(broadcast.signal, envelope.signal);
        assert!(!broadcast.is_return_signal);
    }

    #[test]
    fn broadcast_uses_camel_case_wire_names() {
        let broadcast = SignalBroadcast {
            sender_id: UserId::new("alice").unwrap(),
            target: UserId::new("bob").unwrap(),
            signal: json!(null),
            is_return_signal: true,
        };

        let wire = serde_json::to_value(&broadcast).unwrap();
        assert_eq!(wire["senderId"], "alice");
        assert_eq!(wire["isReturnSignal"], true);
    }
}
