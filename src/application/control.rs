//! ControlHandoff - spotlight and whiteboard authority.
//!
//! The single place where control-state authorization lives: both
//! operations require the session's teacher, and nothing else mutates
//! control state.

use std::sync::Arc;

use serde_json::json;
use thiserror::Error;

use crate::domain::channels;
use crate::domain::foundation::{SessionId, Timestamp, UserId};
use crate::domain::session::{ControlState, SessionError};
use crate::ports::{MessageBus, SessionRegistry};

use super::events;

/// Errors from control handoff operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("session not found: {0}")]
    UnknownSession(SessionId),

    #[error("session has expired")]
    SessionExpired,

    #[error("only the session's teacher may hand off control")]
    Forbidden,

    #[error("user {0} is not a participant of the session")]
    UnknownParticipant(UserId),
}

impl From<SessionError> for ControlError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => ControlError::UnknownSession(id),
            SessionError::Forbidden => ControlError::Forbidden,
            SessionError::UnknownParticipant(user_id) => ControlError::UnknownParticipant(user_id),
            _ => ControlError::SessionExpired,
        }
    }
}

/// Authorizes and broadcasts control reassignments.
pub struct ControlHandoff {
    registry: Arc<dyn SessionRegistry>,
    bus: Arc<dyn MessageBus>,
}

impl ControlHandoff {
    pub fn new(registry: Arc<dyn SessionRegistry>, bus: Arc<dyn MessageBus>) -> Self {
        Self { registry, bus }
    }

    /// Put the spotlight on a participant.
    ///
    /// On success the control-update event is broadcast best-effort:
    /// clients that miss it converge through `fetch_control_state`.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the requester is the session's teacher; control
    ///   state is left unchanged
    /// - `UnknownParticipant` if the target is not present
    pub async fn request_spotlight(
        &self,
        session_id: SessionId,
        requester_id: &UserId,
        target_id: UserId,
    ) -> Result<(), ControlError> {
        let handle = self
            .registry
            .get(&session_id)
            .await
            .ok_or(ControlError::UnknownSession(session_id))?;

        {
            let now = Timestamp::now();
            let mut session = handle.write().await;
            session.grant_spotlight(requester_id, target_id.clone(), &now)?;
        }

        self.announce(
            &session_id,
            events::SPOTLIGHT_CHANGED,
            json!({ "sessionId": session_id, "participantId": target_id }),
        )
        .await;

        Ok(())
    }

    /// Hand whiteboard control to a participant.
    ///
    /// Same authorization and failure modes as
    /// [`request_spotlight`](Self::request_spotlight).
    pub async fn request_controller_change(
        &self,
        session_id: SessionId,
        requester_id: &UserId,
        new_controller_id: UserId,
    ) -> Result<(), ControlError> {
        let handle = self
            .registry
            .get(&session_id)
            .await
            .ok_or(ControlError::UnknownSession(session_id))?;

        {
            let now = Timestamp::now();
            let mut session = handle.write().await;
            session.grant_whiteboard_control(requester_id, new_controller_id.clone(), &now)?;
        }

        self.announce(
            &session_id,
            events::CONTROLLER_CHANGED,
            json!({ "sessionId": session_id, "participantId": new_controller_id }),
        )
        .await;

        Ok(())
    }

    /// Read the session's current control state.
    pub async fn fetch_control_state(
        &self,
        session_id: SessionId,
    ) -> Result<ControlState, ControlError> {
        let handle = self
            .registry
            .get(&session_id)
            .await
            .ok_or(ControlError::UnknownSession(session_id))?;

        let session = handle.read().await;
        Ok(session.control().clone())
    }

    async fn announce(&self, session_id: &SessionId, event: &str, payload: serde_json::Value) {
        let channel = channels::session_channel(session_id);
        if let Err(e) = self.bus.publish(&channel, event, &payload).await {
            tracing::warn!(session_id = %session_id, event, error = %e, "Control-update publish failed");
        }
    }
}
