//! Live session aggregate.
//!
//! A session is the unit of realtime coordination: one teacher, one
//! classroom, a set of present participants, and the control state.
//!
//! # Invariants
//!
//! - `ended_at`, once set, never changes; a session whose `ended_at` lies
//!   in the past is expired and accepts no signaling, whiteboard, or
//!   control traffic.
//! - Control state mutates only through the handoff methods here, and only
//!   at the teacher's request.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ClassroomId, Role, SessionId, Timestamp, UserId};

use super::control::ControlState;
use super::errors::SessionError;
use super::participant::Participant;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Started by the teacher, nobody present yet.
    Created,
    /// At least one participant has joined.
    Active,
    /// Past its end time; terminal.
    Expired,
}

/// Live session aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSession {
    id: SessionId,
    teacher_id: UserId,
    classroom_id: ClassroomId,
    started_at: Timestamp,
    ended_at: Option<Timestamp>,
    participants: HashMap<UserId, Participant>,
    control: ControlState,
}

impl LiveSession {
    /// Creates a session started by the given teacher.
    pub fn new(id: SessionId, teacher_id: UserId, classroom_id: ClassroomId) -> Self {
        let control = ControlState::new(teacher_id.clone());
        Self {
            id,
            teacher_id,
            classroom_id,
            started_at: Timestamp::now(),
            ended_at: None,
            participants: HashMap::new(),
            control,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the session ID.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Returns the owning teacher's user ID.
    pub fn teacher_id(&self) -> &UserId {
        &self.teacher_id
    }

    /// Returns the classroom ID.
    pub fn classroom_id(&self) -> &ClassroomId {
        &self.classroom_id
    }

    /// Returns when the session started.
    pub fn started_at(&self) -> &Timestamp {
        &self.started_at
    }

    /// Returns the end time, if set.
    pub fn ended_at(&self) -> Option<&Timestamp> {
        self.ended_at.as_ref()
    }

    /// Returns the participant entry for a user, if present.
    pub fn participant(&self, user_id: &UserId) -> Option<&Participant> {
        self.participants.get(user_id)
    }

    /// Checks whether a user is currently present.
    pub fn is_participant(&self, user_id: &UserId) -> bool {
        self.participants.contains_key(user_id)
    }

    /// Returns the number of present participants.
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Iterates over present participants.
    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    /// Returns the control state.
    pub fn control(&self) -> &ControlState {
        &self.control
    }

    /// Derives the lifecycle state at the given moment.
    pub fn state(&self, now: &Timestamp) -> SessionState {
        if self.is_expired(now) {
            SessionState::Expired
        } else if self.participants.is_empty() {
            SessionState::Created
        } else {
            SessionState::Active
        }
    }

    /// Checks whether the session is expired at the given moment.
    pub fn is_expired(&self, now: &Timestamp) -> bool {
        self.ended_at.map(|t| now.is_after(&t)).unwrap_or(false)
    }

    /// Most recent activity across participants, or the start time when
    /// nobody has joined yet.
    pub fn last_activity(&self) -> Timestamp {
        self.participants
            .values()
            .map(|p| *p.last_activity())
            .max()
            .unwrap_or(self.started_at)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Membership
    // ─────────────────────────────────────────────────────────────────────────

    /// Adds a participant.
    ///
    /// Re-joining is not an error: the existing entry's activity is
    /// refreshed. Returns `true` when the user was newly added.
    ///
    /// # Errors
    ///
    /// - `Expired` if the session no longer accepts traffic
    /// - `Full` if a capacity policy is configured and reached
    pub fn join(
        &mut self,
        user_id: UserId,
        role: Role,
        now: Timestamp,
        capacity: Option<usize>,
    ) -> Result<bool, SessionError> {
        self.ensure_live(&now)?;

        if let Some(existing) = self.participants.get_mut(&user_id) {
            existing.record_activity(now);
            return Ok(false);
        }

        if let Some(capacity) = capacity {
            if self.participants.len() >= capacity {
                return Err(SessionError::Full { capacity });
            }
        }

        self.participants
            .insert(user_id.clone(), Participant::new(user_id, role, now));
        Ok(true)
    }

    /// Removes a participant. Returns `true` when the user was present.
    pub fn leave(&mut self, user_id: &UserId) -> bool {
        self.participants.remove(user_id).is_some()
    }

    /// Records activity for a participant. Returns `false` for strangers.
    pub fn record_activity(&mut self, user_id: &UserId, now: Timestamp) -> bool {
        match self.participants.get_mut(user_id) {
            Some(participant) => {
                participant.record_activity(now);
                true
            }
            None => false,
        }
    }

    /// Verifies that both ends of a signal are present and the session is
    /// live; used by the relay before publishing.
    ///
    /// # Errors
    ///
    /// - `Expired` if the session no longer accepts traffic
    /// - `UnknownParticipant` naming whichever end is missing
    pub fn verify_route(
        &self,
        sender_id: &UserId,
        target_id: &UserId,
        now: &Timestamp,
    ) -> Result<(), SessionError> {
        self.ensure_live(now)?;
        if !self.is_participant(sender_id) {
            return Err(SessionError::unknown_participant(sender_id.clone()));
        }
        if !self.is_participant(target_id) {
            return Err(SessionError::unknown_participant(target_id.clone()));
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Ends the session now.
    ///
    /// # Errors
    ///
    /// - `AlreadyEnded` if an end time was already set
    pub fn end(&mut self, now: Timestamp) -> Result<(), SessionError> {
        if self.ended_at.is_some() {
            return Err(SessionError::AlreadyEnded);
        }
        self.ended_at = Some(now);
        Ok(())
    }

    /// One sweep step: expires the session if it has been idle longer than
    /// the policy allows. Returns `true` when this call performed the
    /// transition.
    ///
    /// Already-ended sessions are a no-op, which makes repeated sweeps
    /// idempotent. The caller holds the session's write lock, so the idle
    /// check always sees the current participant set.
    pub fn sweep_tick(&mut self, now: &Timestamp, idle_timeout: Duration) -> bool {
        if self.ended_at.is_some() {
            return false;
        }
        let idle = now.duration_since(&self.last_activity());
        match chrono::Duration::from_std(idle_timeout) {
            Ok(limit) if idle > limit => {
                self.ended_at = Some(*now);
                true
            }
            _ => false,
        }
    }

    /// Fails with `Expired` when the session no longer accepts traffic.
    pub fn ensure_live(&self, now: &Timestamp) -> Result<(), SessionError> {
        if self.is_expired(now) {
            Err(SessionError::Expired)
        } else {
            Ok(())
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Control handoff
    // ─────────────────────────────────────────────────────────────────────────

    /// Puts the spotlight on a participant, at the teacher's request.
    ///
    /// # Errors
    ///
    /// - `Expired` if the session no longer accepts traffic
    /// - `Forbidden` unless the requester is the session's teacher
    /// - `UnknownParticipant` if the target is not present
    pub fn grant_spotlight(
        &mut self,
        requester_id: &UserId,
        target_id: UserId,
        now: &Timestamp,
    ) -> Result<(), SessionError> {
        self.authorize_control(requester_id, &target_id, now)?;
        self.control.set_spotlight(target_id);
        Ok(())
    }

    /// Hands whiteboard control to a participant, at the teacher's request.
    ///
    /// Same failure modes as [`grant_spotlight`](Self::grant_spotlight).
    pub fn grant_whiteboard_control(
        &mut self,
        requester_id: &UserId,
        target_id: UserId,
        now: &Timestamp,
    ) -> Result<(), SessionError> {
        self.authorize_control(requester_id, &target_id, now)?;
        self.control.set_whiteboard_controller(target_id);
        Ok(())
    }

    fn authorize_control(
        &self,
        requester_id: &UserId,
        target_id: &UserId,
        now: &Timestamp,
    ) -> Result<(), SessionError> {
        self.ensure_live(now)?;
        if requester_id != &self.teacher_id {
            return Err(SessionError::Forbidden);
        }
        if !self.is_participant(target_id) {
            return Err(SessionError::unknown_participant(target_id.clone()));
        }
        Ok(())
    }
}
