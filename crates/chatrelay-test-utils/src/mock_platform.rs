// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock platform adapter for deterministic testing.
//!
//! Verification matches the secret against the signature verbatim,
//! normalization reads a minimal `{"contact_id", "id", "text"}` shape, and
//! sends are captured for assertion. Send outcomes can be scripted to
//! exercise the retry and failure paths.

use std::sync::Mutex;

use async_trait::async_trait;
use chatrelay_core::ChatRelayError;
use chatrelay_core::error::SendFailureKind;
use chatrelay_core::traits::{PlatformAdapter, PluginAdapter};
use chatrelay_core::types::{
    AdapterType, HealthStatus, InboundMessage, MessageId, MessageKind, OutboundReply, Platform,
    ServiceCredentials, WebhookEvent,
};

/// A mock messaging platform for testing.
///
/// Provides two queues:
/// - **failures**: scripted send failures consumed one per attempt
/// - **sent**: successful sends captured for assertion
pub struct MockPlatform {
    platform: Platform,
    sent: Mutex<Vec<OutboundReply>>,
    failures: Mutex<Vec<SendFailureKind>>,
}

impl MockPlatform {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            sent: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Script the next send attempts to fail with the given kinds, in order.
    pub fn fail_sends_with(&self, kinds: Vec<SendFailureKind>) {
        *self.failures.lock().unwrap() = kinds;
    }

    /// All replies that were sent successfully.
    pub fn sent(&self) -> Vec<OutboundReply> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Build the webhook body shape this mock normalizes.
    pub fn webhook_body(contact_id: &str, external_id: &str, text: &str) -> Vec<u8> {
        serde_json::json!({
            "contact_id": contact_id,
            "id": external_id,
            "text": text,
        })
        .to_string()
        .into_bytes()
    }
}

#[async_trait]
impl PluginAdapter for MockPlatform {
    fn name(&self) -> &str {
        "mock-platform"
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
impl PlatformAdapter for MockPlatform {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn verify(&self, _raw_body: &[u8], signature: Option<&str>, secret: &str) -> bool {
        secret.is_empty() || signature == Some(secret)
    }

    fn normalize(
        &self,
        payload: &serde_json::Value,
    ) -> Result<Vec<WebhookEvent>, ChatRelayError> {
        let contact_id = payload
            .get("contact_id")
            .and_then(|v| v.as_str())
            .unwrap_or("contact-1")
            .to_string();
        let external_id = payload
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or("ext-1")
            .to_string();
        let content = payload
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(vec![WebhookEvent::Message(InboundMessage {
            platform: self.platform,
            contact_id,
            external_id,
            content,
            kind: MessageKind::Text,
            contact_name: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        })])
    }

    async fn send(
        &self,
        _creds: &ServiceCredentials,
        reply: &OutboundReply,
    ) -> Result<MessageId, ChatRelayError> {
        let scripted = {
            let mut failures = self.failures.lock().unwrap();
            if failures.is_empty() {
                None
            } else {
                Some(failures.remove(0))
            }
        };
        if let Some(kind) = scripted {
            return Err(ChatRelayError::Send {
                kind,
                message: "scripted mock failure".into(),
                source: None,
            });
        }
        self.sent.lock().unwrap().push(reply.clone());
        Ok(MessageId(format!("mock-{}", uuid::Uuid::new_v4())))
    }
}
