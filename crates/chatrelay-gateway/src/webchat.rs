// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebChat platform adapter.
//!
//! WebChat has no webhook: messages arrive over the realtime socket
//! (`join_webchat` / `webchat_message` events) and replies are delivered by
//! the conversation-room broadcast the dispatch router already performs.
//! `send` therefore only mints a synthetic platform message id -- the
//! socket room is the send API.

use async_trait::async_trait;
use chatrelay_core::ChatRelayError;
use chatrelay_core::traits::{PlatformAdapter, PluginAdapter};
use chatrelay_core::types::{
    AdapterType, HealthStatus, InboundMessage, MessageId, MessageKind, OutboundReply, Platform,
    ServiceCredentials, WebhookEvent,
};

pub struct WebChatChannel;

#[async_trait]
impl PluginAdapter for WebChatChannel {
    fn name(&self) -> &str {
        "webchat"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Platform
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatRelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ChatRelayError> {
        Ok(())
    }
}

#[async_trait]
impl PlatformAdapter for WebChatChannel {
    fn platform(&self) -> Platform {
        Platform::WebChat
    }

    /// The widget identifies itself with an explicit client-service id;
    /// there is no signature to check.
    fn verify(&self, _raw_body: &[u8], _signature: Option<&str>, _secret: &str) -> bool {
        true
    }

    /// Socket payloads are already near-canonical:
    /// `{"contact_id": ..., "message_id": ..., "text": ...}`.
    fn normalize(
        &self,
        payload: &serde_json::Value,
    ) -> Result<Vec<WebhookEvent>, ChatRelayError> {
        let contact_id = payload
            .get("contact_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ChatRelayError::Internal("webchat payload missing contact_id".into()))?;
        let external_id = payload
            .get("message_id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("wc-{}", uuid::Uuid::new_v4()));
        let content = payload
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(vec![WebhookEvent::Message(InboundMessage {
            platform: Platform::WebChat,
            contact_id: contact_id.to_string(),
            external_id,
            content,
            kind: MessageKind::Text,
            contact_name: payload
                .get("contact_name")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            timestamp: chrono::Utc::now().to_rfc3339(),
        })])
    }

    async fn send(
        &self,
        _creds: &ServiceCredentials,
        _reply: &OutboundReply,
    ) -> Result<MessageId, ChatRelayError> {
        // Delivery already happened through the conversation-room publish.
        Ok(MessageId(format!("wc-{}", uuid::Uuid::new_v4())))
    }
}
