// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram channel adapter for ChatRelay.
//!
//! Implements [`PlatformAdapter`] for the Telegram Bot API in webhook mode:
//! updates arrive as `POST /webhooks/telegram/{token}` calls and are parsed
//! with teloxide's typed schema; outbound sends go through the Bot API with
//! the per-tenant token. Authenticity rests on the secret URL path token,
//! with an optional `X-Telegram-Bot-Api-Secret-Token` header compare.

pub mod normalize;
pub mod send;

use async_trait::async_trait;
use chatrelay_config::model::TelegramConfig;
use chatrelay_core::ChatRelayError;
use chatrelay_core::traits::{PlatformAdapter, PluginAdapter};
use chatrelay_core::types::{
    AdapterType, HealthStatus, MessageId, OutboundReply, Platform, ServiceCredentials,
    WebhookEvent,
};
use tracing::debug;

use crate::send::BotApiClient;

/// Telegram platform adapter.
pub struct TelegramChannel {
    api: BotApiClient,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig) -> Result<Self, ChatRelayError> {
        Ok(Self {
            api: BotApiClient::new(config)?,
        })
    }
}

#[async_trait]
impl PluginAdapter for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Platform
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatRelayError> {
        // Bot tokens are per-tenant; nothing global to probe.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ChatRelayError> {
        debug!("Telegram channel shutting down");
        Ok(())
    }
}

#[async_trait]
impl PlatformAdapter for TelegramChannel {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    /// The URL path token is the primary authenticity check and has already
    /// resolved the service by the time this runs. When the service also
    /// configures a webhook secret, the header must match it exactly.
    fn verify(&self, _raw_body: &[u8], signature: Option<&str>, secret: &str) -> bool {
        if secret.is_empty() {
            return true;
        }
        signature == Some(secret)
    }

    fn normalize(
        &self,
        payload: &serde_json::Value,
    ) -> Result<Vec<WebhookEvent>, ChatRelayError> {
        normalize::normalize(payload)
    }

    async fn send(
        &self,
        creds: &ServiceCredentials,
        reply: &OutboundReply,
    ) -> Result<MessageId, ChatRelayError> {
        self.api.send_message(creds, reply).await
    }

    async fn send_typing(
        &self,
        creds: &ServiceCredentials,
        contact_id: &str,
    ) -> Result<(), ChatRelayError> {
        self.api.send_typing(creds, contact_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_channel() -> TelegramChannel {
        TelegramChannel::new(&TelegramConfig::default()).unwrap()
    }

    #[test]
    fn adapter_metadata() {
        let channel = make_channel();
        assert_eq!(channel.name(), "telegram");
        assert_eq!(channel.adapter_type(), AdapterType::Platform);
        assert_eq!(channel.platform(), Platform::Telegram);
    }

    #[test]
    fn verify_passes_without_configured_secret() {
        let channel = make_channel();
        assert!(channel.verify(b"{}", None, ""));
        assert!(channel.verify(b"{}", Some("anything"), ""));
    }

    #[test]
    fn verify_requires_matching_header_when_secret_configured() {
        let channel = make_channel();
        assert!(channel.verify(b"{}", Some("hook-secret"), "hook-secret"));
        assert!(!channel.verify(b"{}", Some("wrong"), "hook-secret"));
        assert!(!channel.verify(b"{}", None, "hook-secret"));
    }

    #[tokio::test]
    async fn health_check_is_healthy() {
        let channel = make_channel();
        assert_eq!(channel.health_check().await.unwrap(), HealthStatus::Healthy);
    }
}
