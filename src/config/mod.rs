//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment
//! variables using the `config` and `dotenvy` crates. Configuration is
//! loaded with the `CLASSROOM_LIVE` prefix and nested values use double
//! underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use classroom_live::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod auth;
mod database;
mod error;
mod messaging;
mod redis;
mod server;
mod session;

pub use auth::AuthConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use messaging::{AblySettings, BusProvider, MessagingConfig, PusherSettings};
pub use redis::RedisConfig;
pub use server::{Environment, ServerConfig};
pub use session::SessionPolicyConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Contains all configuration sections for the realtime coordination
/// service. Load using [`AppConfig::load()`] which reads from environment
/// variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (session directory mirror)
    pub database: DatabaseConfig,

    /// Redis configuration (whiteboard snapshot store)
    pub redis: RedisConfig,

    /// Message bus configuration (backend selection + credentials)
    pub messaging: MessagingConfig,

    /// Authentication configuration (platform JWTs)
    pub auth: AuthConfig,

    /// Session lifecycle policy
    #[serde(default)]
    pub session: SessionPolicyConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `CLASSROOM_LIVE` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `CLASSROOM_LIVE__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `CLASSROOM_LIVE__MESSAGING__PROVIDER=ably` -> `messaging.provider = Ably`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required environment variables are missing
    /// or cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("CLASSROOM_LIVE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.redis.validate()?;
        self.messaging.validate()?;
        self.auth.validate(&self.server.environment)?;
        self.session.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
