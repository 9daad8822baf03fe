//! Whiteboard snapshot value object.
//!
//! The document blob belongs to the whiteboard client protocol; this layer
//! stores and forwards it without inspecting size or structure.

use serde::{Deserialize, Serialize};

use super::foundation::{SessionId, Timestamp, UserId};

/// The complete current state of a room's whiteboard.
///
/// Exactly one current snapshot exists per room: each write replaces the
/// previous one (last-write-wins by store arrival order, no merge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhiteboardSnapshot {
    /// Room identifier; rooms are keyed by session.
    pub room_id: SessionId,

    /// Opaque document state.
    pub content: serde_json::Value,

    /// Last writer, so subscribers can drop their own echo.
    pub sender_id: UserId,

    /// Server-side write timestamp.
    pub updated_at: Timestamp,
}

impl WhiteboardSnapshot {
    /// Creates a snapshot stamped with the current server time.
    pub fn new(room_id: SessionId, content: serde_json::Value, sender_id: UserId) -> Self {
        Self {
            room_id,
            content,
            sender_id,
            updated_at: Timestamp::now(),
        }
    }

    /// Wire payload published on the room's presence channel.
    pub fn to_broadcast(&self) -> WhiteboardBroadcast {
        WhiteboardBroadcast {
            room_id: self.room_id,
            sender_id: self.sender_id.clone(),
            snapshot: self.content.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Event payload published for a whiteboard update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiteboardBroadcast {
    pub room_id: SessionId,
    pub sender_id: UserId,
    pub snapshot: serde_json::Value,
    pub updated_at: Timestamp,
}
