//! JWT implementation of the AuthProvider port.
//!
//! Verifies HS256 bearer tokens issued by the platform's auth service and
//! extracts the `{user_id, role, class_id}` identity this layer works
//! with.

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::domain::foundation::{ClassroomId, Role, UserId};
use crate::ports::{AuthError, AuthProvider, AuthenticatedUser};

/// Claims this service reads from platform tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: String,
    /// Participant role.
    pub role: Role,
    /// Classroom the token grants access to.
    pub class_id: Uuid,
    /// Expiry as Unix seconds.
    pub exp: i64,
}

/// JWT-verifying auth provider.
pub struct JwtAuthProvider {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthProvider {
    /// Creates a provider from configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        if let Some(audience) = &config.audience {
            validation.set_audience(&[audience]);
        }

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.expose_secret().as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl AuthProvider for JwtAuthProvider {
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            }
        })?;

        let user_id = UserId::new(data.claims.sub).map_err(|_| AuthError::InvalidToken)?;

        Ok(AuthenticatedUser {
            user_id,
            role: data.claims.role,
            class_id: ClassroomId::from_uuid(data.claims.class_id),
        })
    }
}
