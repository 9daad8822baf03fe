//! Control state: spotlight and whiteboard authority.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::UserId;

/// Per-session control designations.
///
/// Mutated only through the session aggregate's handoff methods; no other
/// component writes these fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlState {
    /// Participant currently emphasized as presenter, if any.
    spotlight: Option<UserId>,

    /// Participant authorized to edit the shared whiteboard.
    whiteboard_controller: UserId,
}

impl ControlState {
    /// Initial control state: no spotlight, the teacher holds the
    /// whiteboard.
    pub fn new(teacher_id: UserId) -> Self {
        Self {
            spotlight: None,
            whiteboard_controller: teacher_id,
        }
    }

    /// Returns the spotlighted participant, if any.
    pub fn spotlight(&self) -> Option<&UserId> {
        self.spotlight.as_ref()
    }

    /// Returns the current whiteboard controller.
    pub fn whiteboard_controller(&self) -> &UserId {
        &self.whiteboard_controller
    }

    pub(super) fn set_spotlight(&mut self, participant: UserId) {
        self.spotlight = Some(participant);
    }

    pub(super) fn set_whiteboard_controller(&mut self, participant: UserId) {
        self.whiteboard_controller = participant;
    }
}
