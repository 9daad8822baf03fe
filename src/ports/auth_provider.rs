//! AuthProvider port - verifies caller identity.
//!
//! The platform's auth service issues the tokens; this port only verifies
//! them and yields the authenticated identity used for every request.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::{ClassroomId, Role, UserId};

/// Identity of the current caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub role: Role,
    pub class_id: ClassroomId,
}

/// Errors verifying a caller's token.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token expired")]
    TokenExpired,

    #[error("invalid token")]
    InvalidToken,

    #[error("auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Verifies bearer tokens into authenticated identities.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Verify a bearer token.
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}
