// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Meta platform adapters for ChatRelay.
//!
//! Implements [`PlatformAdapter`] for the three platforms delivered through
//! Meta's unified webhook -- WhatsApp Cloud API, Messenger, and Instagram --
//! sharing the HMAC verifier, payload normalizer, and Graph API send
//! client. One adapter instance per platform serves all tenants; per-service
//! credentials arrive with each call.

pub mod normalize;
pub mod send;
pub mod signature;

use async_trait::async_trait;
use chatrelay_config::model::MetaConfig;
use chatrelay_core::error::ChatRelayError;
use chatrelay_core::traits::{PlatformAdapter, PluginAdapter};
use chatrelay_core::types::{
    AdapterType, HealthStatus, MessageId, OutboundReply, Platform, ServiceCredentials,
    WebhookEvent,
};
use tracing::debug;

use crate::send::GraphClient;

/// Adapter for one Meta-delivered platform.
pub struct MetaChannel {
    platform: Platform,
    name: &'static str,
    graph: GraphClient,
}

impl MetaChannel {
    /// Creates an adapter for `platform`, which must be one of the
    /// Meta-delivered platforms.
    pub fn new(platform: Platform, config: &MetaConfig) -> Result<Self, ChatRelayError> {
        if !platform.is_meta() {
            return Err(ChatRelayError::Config(format!(
                "{platform} is not delivered through the Meta webhook"
            )));
        }
        let name = match platform {
            Platform::WhatsApp => "whatsapp",
            Platform::Messenger => "messenger",
            Platform::Instagram => "instagram",
            _ => unreachable!("guarded by is_meta"),
        };
        Ok(Self {
            platform,
            name,
            graph: GraphClient::new(config)?,
        })
    }
}

#[async_trait]
impl PluginAdapter for MetaChannel {
    fn name(&self) -> &str {
        self.name
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Platform
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatRelayError> {
        // Credentials are per-tenant; there is no global Graph API session
        // to probe without picking a tenant.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ChatRelayError> {
        debug!(platform = %self.platform, "Meta channel shutting down");
        Ok(())
    }
}

#[async_trait]
impl PlatformAdapter for MetaChannel {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn verify(&self, raw_body: &[u8], signature: Option<&str>, secret: &str) -> bool {
        match signature {
            Some(header) => signature::verify_signature(raw_body, header, secret),
            None => false,
        }
    }

    fn normalize(
        &self,
        payload: &serde_json::Value,
    ) -> Result<Vec<WebhookEvent>, ChatRelayError> {
        normalize::normalize(self.platform, payload)
    }

    async fn send(
        &self,
        creds: &ServiceCredentials,
        reply: &OutboundReply,
    ) -> Result<MessageId, ChatRelayError> {
        match self.platform {
            Platform::WhatsApp => self.graph.send_whatsapp(creds, reply).await,
            _ => self.graph.send_messenger(creds, reply).await,
        }
    }

    async fn send_typing(
        &self,
        creds: &ServiceCredentials,
        contact_id: &str,
    ) -> Result<(), ChatRelayError> {
        match self.platform {
            // The WhatsApp Cloud API has no typing indicator action.
            Platform::WhatsApp => Ok(()),
            _ => self.graph.send_messenger_typing(creds, contact_id).await,
        }
    }
}
