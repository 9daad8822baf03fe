//! Session-specific error types.

use crate::domain::foundation::{ErrorCode, SessionId, UserId};

/// Session-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Session was not found in the registry.
    NotFound(SessionId),
    /// Session has expired and accepts no further traffic.
    Expired,
    /// Session reached its configured capacity.
    Full { capacity: usize },
    /// End time is immutable once set.
    AlreadyEnded,
    /// Requester is not authorized for the operation.
    Forbidden,
    /// Referenced user is not a current participant.
    UnknownParticipant(UserId),
    /// Session directory (relational mirror) failure.
    Directory(String),
}

impl SessionError {
    pub fn not_found(id: SessionId) -> Self {
        SessionError::NotFound(id)
    }
    pub fn unknown_participant(user_id: UserId) -> Self {
        SessionError::UnknownParticipant(user_id)
    }
    pub fn directory(message: impl Into<String>) -> Self {
        SessionError::Directory(message.into())
    }
    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::NotFound(_) => ErrorCode::SessionNotFound,
            SessionError::Expired => ErrorCode::SessionExpired,
            SessionError::Full { .. } => ErrorCode::SessionFull,
            SessionError::AlreadyEnded => ErrorCode::SessionAlreadyEnded,
            SessionError::Forbidden => ErrorCode::Forbidden,
            SessionError::UnknownParticipant(_) => ErrorCode::UnknownParticipant,
            SessionError::Directory(_) => ErrorCode::DatabaseError,
        }
    }
    pub fn message(&self) -> String {
        match self {
            SessionError::NotFound(id) => format!("Session not found: {}", id),
            SessionError::Expired => "Session has expired".to_string(),
            SessionError::Full { capacity } => {
                format!("Session is full (capacity {})", capacity)
            }
            SessionError::AlreadyEnded => "Session has already ended".to_string(),
            SessionError::Forbidden => "Permission denied".to_string(),
            SessionError::UnknownParticipant(user_id) => {
                format!("User {} is not a participant of the session", user_id)
            }
            SessionError::Directory(msg) => format!("Session directory error: {}", msg),
        }
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for SessionError {}
