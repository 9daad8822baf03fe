//! Pusher Channels implementation of the MessageBus port.
//!
//! Publishes over the Channels REST API with HMAC-SHA256 signed requests
//! and signs presence/private subscription handshakes.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use sha2::Sha256;

use crate::config::PusherSettings;
use crate::domain::channels::{ChannelName, Visibility};
use crate::ports::{
    MessageBus, PresenceMember, PublishError, SubscriptionAuthError, SubscriptionRequest,
};

use super::BusConfigError;

type HmacSha256 = Hmac<Sha256>;

/// Pusher Channels message bus.
pub struct PusherBus {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
    key: String,
    secret: SecretString,
}

impl PusherBus {
    /// Creates a bus from configuration.
    ///
    /// # Errors
    ///
    /// Returns `BusConfigError` if credentials are incomplete or the HTTP
    /// client cannot be constructed.
    pub fn new(settings: &PusherSettings, publish_timeout: Duration) -> Result<Self, BusConfigError> {
        let secret = settings
            .secret
            .clone()
            .ok_or(BusConfigError::MissingCredential("pusher secret"))?;

        let http = reqwest::Client::builder()
            .timeout(publish_timeout)
            .build()
            .map_err(|e| BusConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            base_url: format!("https://api-{}.pusher.com", settings.cluster),
            app_id: settings.app_id.clone(),
            key: settings.key.clone(),
            secret,
        })
    }

    fn hmac_hex(&self, message: &str) -> Result<String, PublishError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| PublishError::Serialization(e.to_string()))?;
        mac.update(message.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Signs a REST request per the Channels auth scheme: the query keys in
    /// lexicographic order, then `METHOD\npath\nquery`.
    fn signed_query(&self, path: &str, body: &str) -> Result<String, PublishError> {
        let body_md5 = format!("{:x}", md5::compute(body.as_bytes()));
        let timestamp = chrono::Utc::now().timestamp();
        let query = format!(
            "auth_key={}&auth_timestamp={}&auth_version=1.0&body_md5={}",
            self.key, timestamp, body_md5
        );
        let to_sign = format!("POST\n{}\n{}", path, query);
        let signature = self.hmac_hex(&to_sign)?;
        Ok(format!("{}&auth_signature={}", query, signature))
    }
}

#[async_trait]
impl MessageBus for PusherBus {
    async fn publish(
        &self,
        channel: &ChannelName,
        event: &str,
        payload: &serde_json::Value,
    ) -> Result<(), PublishError> {
        // Channels carries event data as a string field.
        let data = serde_json::to_string(payload)
            .map_err(|e| PublishError::Serialization(e.to_string()))?;
        let body = serde_json::to_string(&json!({
            "name": event,
            "channels": [channel.as_str()],
            "data": data,
        }))
        .map_err(|e| PublishError::Serialization(e.to_string()))?;

        let path = format!("/apps/{}/events", self.app_id);
        let query = self.signed_query(&path, &body)?;
        let url = format!("{}{}?{}", self.base_url, path, query);

        let response = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .body(body)
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
        let socket_id = request.socket_id.as_str();
        let channel = request.channel.as_str();

        match request.channel.visibility() {
            Visibility::Public => Err(SubscriptionAuthError::Invalid(
                "public channels do not require authorization".to_string(),
            )),
            Visibility::Presence => {
                // Presence members carry the authenticated identity payload.
                let channel_data = serde_json::to_string(&json!({
                    "user_id": member.user_id,
                    "user_info": { "role": member.role },
                }))
                .map_err(|e| SubscriptionAuthError::Invalid(e.to_string()))?;

                let to_sign = format!("{}:{}:{}", socket_id, channel, channel_data);
                let signature = self
                    .hmac_hex(&to_sign)
                    .map_err(|e| SubscriptionAuthError::Invalid(e.to_string()))?;

                Ok(json!({
                    "auth": format!("{}:{}", self.key, signature),
                    "channel_data": channel_data,
                }))
            }
            Visibility::PrivatePair => {
                let to_sign = format!("{}:{}", socket_id, channel);
                let signature = self
                    .hmac_hex(&to_sign)
                    .map_err(|e| SubscriptionAuthError::Invalid(e.to_string()))?;

                Ok(json!({
                    "auth": format!("{}:{}", self.key, signature),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::channels;
    use crate::domain::foundation::{Role, SessionId, SocketId, UserId};

    fn test_bus() -> PusherBus {
        let settings = PusherSettings {
            app_id: "123456".to_string(),
            key: "test-key".to_string(),
            secret: Some(SecretString::new("test-secret".to_string())),
            cluster: "eu".to_string(),
        };
        PusherBus::new(&settings, Duration::from_secs(5)).unwrap()
    }

    fn presence_request() -> SubscriptionRequest {
        SubscriptionRequest {
            socket_id: SocketId::new("1234.5678").unwrap(),
            channel: channels::session_channel(&SessionId::new()),
        }
    }

    fn member() -> PresenceMember {
        PresenceMember {
            user_id: UserId::new("user-1").unwrap(),
            role: Role::Student,
        }
    }

    #[test]
    fn new_requires_secret() {
        let settings = PusherSettings {
            app_id: "123456".to_string(),
            key: "test-key".to_string(),
            secret: None,
            cluster: "eu".to_string(),
        };
        assert!(matches!(
            PusherBus::new(&settings, Duration::from_secs(5)),
            Err(BusConfigError::MissingCredential(_))
        ));
    }

    #[test]
    fn cluster_determines_base_url() {
        let bus = test_bus();
        assert_eq!(bus.base_url, "https://api-eu.pusher.com");
    }

    #[test]
    fn signatures_are_hex_sha256_and_deterministic() {
        let bus = test_bus();
        let a = bus.hmac_hex("1234.5678:presence-session-x").unwrap();
        let b = bus.hmac_hex("1234.5678:presence-session-x").unwrap();

        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, b);

        let other = bus.hmac_hex("9999.0000:presence-session-x").unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn signed_query_carries_required_params() {
        let bus = test_bus();
        let query = bus.signed_query("/apps/123456/events", "{}").unwrap();

        assert!(query.contains("auth_key=test-key"));
        assert!(query.contains("auth_version=1.0"));
        assert!(query.contains("body_md5="));
        assert!(query.contains("auth_signature="));
    }

    #[test]
    fn presence_auth_includes_identity_payload() {
        let bus = test_bus();
        let auth = bus.authorize_subscription(&presence_request(), &member()).unwrap();

        let auth_field = auth["auth"].as_str().unwrap();
        assert!(auth_field.starts_with("test-key:"));

        let channel_data: serde_json::Value =
            serde_json::from_str(auth["channel_data"].as_str().unwrap()).unwrap();
        assert_eq!(channel_data["user_id"], "user-1");
        assert_eq!(channel_data["user_info"]["role"], "student");
    }

    #[test]
    fn private_auth_has_no_channel_data() {
        let bus = test_bus();
        let request = SubscriptionRequest {
            socket_id: SocketId::new("1234.5678").unwrap(),
            channel: channels::direct_channel(
                &UserId::new("alice").unwrap(),
                &UserId::new("bob").unwrap(),
            ),
        };

        let auth = bus.authorize_subscription(&request, &member()).unwrap();
        assert!(auth.get("auth").is_some());
        assert!(auth.get("channel_data").is_none());
    }

    #[test]
    fn public_channel_auth_is_invalid() {
        let bus = test_bus();
        let request = SubscriptionRequest {
            socket_id: SocketId::new("1234.5678").unwrap(),
            channel: channels::classroom_channel(&crate::domain::foundation::ClassroomId::new()),
        };

        assert!(matches!(
            bus.authorize_subscription(&request, &member()),
            Err(SubscriptionAuthError::Invalid(_))
        ));
    }
}
