//! Request/response DTOs for the realtime HTTP surface.
//!
//! Wire names are camelCase to match the platform's web clients.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::foundation::UserId;
use crate::domain::session::ControlState;
use crate::domain::whiteboard::WhiteboardSnapshot;

// ════════════════════════════════════════════════════════════════════════════
// Requests
// ════════════════════════════════════════════════════════════════════════════

/// POST /sessions
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub classroom_id: Uuid,
}

/// POST /sessions/:id/signal
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRequest {
    /// Must match the caller's authenticated identity.
    pub user_id: UserId,
    pub target: UserId,
    /// Opaque peer-connection payload.
    pub signal: serde_json::Value,
    #[serde(default)]
    pub is_return_signal: bool,
}

/// POST /sessions/:id/whiteboard
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiteboardUpdateRequest {
    /// Must match the caller's authenticated identity.
    pub sender_id: UserId,
    /// Opaque whiteboard document blob.
    pub snapshot: serde_json::Value,
}

/// POST /sessions/:id/spotlight and /sessions/:id/controller
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlRequest {
    /// Must match the caller's authenticated identity.
    pub requester_id: UserId,
    pub target_id: UserId,
}

/// POST /bus/auth - presence-channel subscription handshake
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusAuthRequest {
    pub socket_id: String,
    pub channel_name: String,
}

// ════════════════════════════════════════════════════════════════════════════
// Responses
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartedResponse {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiteboardUpdateResponse {
    /// False when the update degraded to delivery-only.
    pub persisted: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiteboardFetchResponse {
    /// Absent when no snapshot has ever been written for the room.
    pub snapshot: Option<serde_json::Value>,
    pub sender_id: Option<UserId>,
    pub updated_at: Option<crate::domain::foundation::Timestamp>,
}

impl From<Option<WhiteboardSnapshot>> for WhiteboardFetchResponse {
    fn from(snapshot: Option<WhiteboardSnapshot>) -> Self {
        match snapshot {
            Some(s) => Self {
                snapshot: Some(s.content),
                sender_id: Some(s.sender_id),
                updated_at: Some(s.updated_at),
            },
            None => Self {
                snapshot: None,
                sender_id: None,
                updated_at: None,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlStateResponse {
    pub spotlighted_participant_id: Option<UserId>,
    pub whiteboard_controller_id: UserId,
}

impl From<ControlState> for ControlStateResponse {
    fn from(state: ControlState) -> Self {
        Self {
            spotlighted_participant_id: state.spotlight().cloned(),
            whiteboard_controller_id: state.whiteboard_controller().clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub cleaned: usize,
}

/// Standard error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, "BAD_REQUEST")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(message, "FORBIDDEN")
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::new(format!("{} not found: {}", entity, id), "NOT_FOUND")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message, "INTERNAL_ERROR")
    }
}
