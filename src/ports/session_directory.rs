//! SessionDirectory port - relational mirror of session metadata.
//!
//! The classroom CRUD layer owns the relational store; this service reads
//! and writes only the session/participant fields it coordinates (ids,
//! start/end times, membership).

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::{SessionId, Timestamp, UserId};
use crate::domain::session::{LiveSession, Participant};

/// Errors from the session directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("session directory unavailable: {0}")]
    Unavailable(String),
}

/// Mirror of session/participant metadata in the relational store.
#[async_trait]
pub trait SessionDirectory: Send + Sync {
    /// Record a newly started session.
    async fn record_started(&self, session: &LiveSession) -> Result<(), DirectoryError>;

    /// Record a participant joining (idempotent upsert).
    async fn record_joined(
        &self,
        session_id: &SessionId,
        participant: &Participant,
    ) -> Result<(), DirectoryError>;

    /// Record a participant leaving.
    async fn record_left(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<(), DirectoryError>;

    /// Record the session's end time. The end time is immutable: once a
    /// row has one, later calls must not change it.
    async fn record_ended(
        &self,
        session_id: &SessionId,
        ended_at: &Timestamp,
    ) -> Result<(), DirectoryError>;
}
