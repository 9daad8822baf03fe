//! Mock auth provider for testing.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::ports::{AuthError, AuthProvider, AuthenticatedUser};

/// Auth provider that accepts pre-registered tokens.
///
/// For **testing only**: panics on poisoned locks.
pub struct MockAuthProvider {
    users: RwLock<HashMap<String, AuthenticatedUser>>,
}

impl MockAuthProvider {
    /// Creates an empty provider; every token is rejected until allowed.
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a token as valid for the given identity.
    pub fn allow(&self, token: impl Into<String>, user: AuthenticatedUser) {
        self.users
            .write()
            .expect("MockAuthProvider: lock poisoned")
            .insert(token.into(), user);
    }
}

impl Default for MockAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        self.users
            .read()
            .expect("MockAuthProvider: lock poisoned")
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}
