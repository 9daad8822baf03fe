//! Ably implementation of the MessageBus port.
//!
//! Publishes over the Ably REST API with basic auth and answers
//! subscription handshakes with signed token requests scoped to the
//! requested channel's capabilities.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use crate::config::AblySettings;
use crate::domain::channels::{ChannelName, Visibility};
use crate::ports::{
    MessageBus, PresenceMember, PublishError, SubscriptionAuthError, SubscriptionRequest,
};

use super::BusConfigError;

type HmacSha256 = Hmac<Sha256>;

/// Token lifetime handed to subscribing clients.
const TOKEN_TTL_MS: i64 = 3_600_000;

/// Ably message bus.
pub struct AblyBus {
    http: reqwest::Client,
    base_url: String,
    key_name: String,
    key_secret: SecretString,
}

impl AblyBus {
    /// Creates a bus from configuration.
    ///
    /// # Errors
    ///
    /// Returns `BusConfigError` if the API key is missing or malformed, or
    /// the HTTP client cannot be constructed.
    pub fn new(settings: &AblySettings, publish_timeout: Duration) -> Result<Self, BusConfigError> {
        let api_key = settings
            .api_key
            .as_ref()
            .ok_or(BusConfigError::MissingCredential("ably api key"))?;

        let (key_name, key_secret) = api_key
            .expose_secret()
            .split_once(':')
            .ok_or(BusConfigError::InvalidKey)?;

        let http = reqwest::Client::builder()
            .timeout(publish_timeout)
            .build()
            .map_err(|e| BusConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            base_url: "https://rest.ably.io".to_string(),
            key_name: key_name.to_string(),
            key_secret: SecretString::new(key_secret.to_string()),
        })
    }

    /// Capability grant for one channel, by visibility class.
    fn capability_for(channel: &ChannelName) -> Result<String, SubscriptionAuthError> {
        let operations = match channel.visibility() {
            Visibility::Public => {
                return Err(SubscriptionAuthError::Invalid(
                    "public channels do not require authorization".to_string(),
                ))
            }
            Visibility::Presence => json!(["subscribe", "presence"]),
            Visibility::PrivatePair => json!(["subscribe"]),
        };
        serde_json::to_string(&json!({ channel.as_str(): operations }))
            .map_err(|e| SubscriptionAuthError::Invalid(e.to_string()))
    }

    fn token_mac(
        &self,
        ttl: i64,
        capability: &str,
        client_id: &str,
        timestamp: i64,
        nonce: &str,
    ) -> Result<String, SubscriptionAuthError> {
        let to_sign = format!(
            "{}\n{}\n{}\n{}\n{}\n{}\n",
            self.key_name, ttl, capability, client_id, timestamp, nonce
        );
        let mut mac = HmacSha256::new_from_slice(self.key_secret.expose_secret().as_bytes())
            .map_err(|e| SubscriptionAuthError::Invalid(e.to_string()))?;
        mac.update(to_sign.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl MessageBus for AblyBus {
    async fn publish(
        &self,
        channel: &ChannelName,
        event: &str,
        payload: &serde_json::Value,
    ) -> Result<(), PublishError> {
        let url = format!("{}/channels/{}/messages", self.base_url, channel.as_str());

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.key_name, Some(self.key_secret.expose_secret()))
            .json(&json!({ "name": event, "data": payload }))
            .send()
            .await
            .map_err(|e| PublishError::BackendUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected(format!("{}: {}", status, detail)));
        }

        Ok(())
    }

    fn authorize_subscription(
        &self,
        request: &SubscriptionRequest,
        member: &PresenceMember,
    ) -> Result<serde_json::Value, SubscriptionAuthError> {
        let capability = Self::capability_for(&request.channel)?;
        let client_id = member.user_id.as_str();
        let timestamp = chrono::Utc::now().timestamp_millis();
        let nonce = Uuid::new_v4().simple().to_string();
        let mac = self.token_mac(TOKEN_TTL_MS, &capability, client_id, timestamp, &nonce)?;

        Ok(json!({
            "keyName": self.key_name,
            "ttl": TOKEN_TTL_MS,
            "capability": capability,
            "clientId": client_id,
            "timestamp": timestamp,
            "nonce": nonce,
            "mac": mac,
        }))
    }
}
