//! Message bus configuration.
//!
//! Two pub/sub providers implement the same relay contract; exactly one is
//! active per deployment. The choice lives here, not in relay logic.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Which pub/sub backend publishes realtime events.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusProvider {
    #[default]
    Pusher,
    Ably,
}

/// Message bus configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MessagingConfig {
    /// Active backend
    #[serde(default)]
    pub provider: BusProvider,

    /// Pusher Channels credentials
    #[serde(default)]
    pub pusher: PusherSettings,

    /// Ably credentials
    #[serde(default)]
    pub ably: AblySettings,

    /// Bounded timeout for a single publish call, in seconds
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_secs: u64,
}

/// Pusher Channels application credentials.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PusherSettings {
    pub app_id: String,
    pub key: String,
    pub secret: Option<SecretString>,
    #[serde(default = "default_cluster")]
    pub cluster: String,
}

/// Ably application credentials.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AblySettings {
    /// Full API key in `name:secret` form.
    pub api_key: Option<SecretString>,
}

impl MessagingConfig {
    /// Get publish timeout as Duration
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    /// Validate messaging configuration for the active provider
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.publish_timeout_secs == 0 || self.publish_timeout_secs > 30 {
            return Err(ValidationError::InvalidTimeout);
        }
        match self.provider {
            BusProvider::Pusher => {
                if self.pusher.app_id.is_empty() {
                    return Err(ValidationError::MissingRequired("MESSAGING_PUSHER_APP_ID"));
                }
                if self.pusher.key.is_empty() {
                    return Err(ValidationError::MissingRequired("MESSAGING_PUSHER_KEY"));
                }
                if self.pusher.secret.is_none() {
                    return Err(ValidationError::MissingRequired("MESSAGING_PUSHER_SECRET"));
                }
            }
            BusProvider::Ably => {
                let key = self
                    .ably
                    .api_key
                    .as_ref()
                    .ok_or(ValidationError::MissingRequired("MESSAGING_ABLY_API_KEY"))?;
                if !key.expose_secret().contains(':') {
                    return Err(ValidationError::InvalidAblyKey);
                }
            }
        }
        Ok(())
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            provider: BusProvider::default(),
            pusher: PusherSettings::default(),
            ably: AblySettings::default(),
            publish_timeout_secs: default_publish_timeout(),
        }
    }
}

fn default_publish_timeout() -> u64 {
    5
}

fn default_cluster() -> String {
    "mt1".to_string()
}
