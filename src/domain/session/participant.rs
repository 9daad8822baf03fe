//! Participant entity within a live session.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Role, Timestamp, UserId};

/// One user currently present in a session.
///
/// Owned by exactly one session; lookups always go through the session
/// lifecycle manager, never a cache of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    user_id: UserId,
    role: Role,
    joined_at: Timestamp,
    last_activity: Timestamp,
}

impl Participant {
    /// Creates a participant joining at the given moment.
    pub fn new(user_id: UserId, role: Role, joined_at: Timestamp) -> Self {
        Self {
            user_id,
            role,
            joined_at,
            last_activity: joined_at,
        }
    }

    /// Returns the user id.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns the role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns when the participant joined.
    pub fn joined_at(&self) -> &Timestamp {
        &self.joined_at
    }

    /// Returns the last recorded activity.
    pub fn last_activity(&self) -> &Timestamp {
        &self.last_activity
    }

    /// Records activity at the given moment.
    ///
    /// Activity timestamps never move backwards.
    pub fn record_activity(&mut self, at: Timestamp) {
        if at.is_after(&self.last_activity) {
            self.last_activity = at;
        }
    }
}
