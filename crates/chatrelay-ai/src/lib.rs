// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI responder adapter for ChatRelay.
//!
//! Wraps the completion API client in the [`ResponderAdapter`] trait so the
//! dispatch router sees the AI collaborator as a black box: history and
//! tenant personality in, text or an explicit failure out.

pub mod client;

use async_trait::async_trait;
use chatrelay_config::model::ResponderConfig;
use chatrelay_core::ChatRelayError;
use chatrelay_core::traits::responder::CompletionRequest;
use chatrelay_core::traits::{PluginAdapter, ResponderAdapter};
use chatrelay_core::types::{AdapterType, HealthStatus};

use crate::client::CompletionClient;

/// Responder adapter backed by the completion API.
pub struct AiResponder {
    client: CompletionClient,
}

impl AiResponder {
    pub fn new(config: &ResponderConfig) -> Result<Self, ChatRelayError> {
        Ok(Self {
            client: CompletionClient::new(config)?,
        })
    }
}

#[async_trait]
impl PluginAdapter for AiResponder {
    fn name(&self) -> &str {
        "completion-api"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Responder
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatRelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ChatRelayError> {
        Ok(())
    }
}

#[async_trait]
impl ResponderAdapter for AiResponder {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ChatRelayError> {
        self.client.complete(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_requires_api_key() {
        assert!(AiResponder::new(&ResponderConfig::default()).is_err());
    }

    #[test]
    fn adapter_metadata() {
        let config = ResponderConfig {
            api_key: Some("key".into()),
            ..Default::default()
        };
        let responder = AiResponder::new(&config).unwrap();
        assert_eq!(responder.name(), "completion-api");
        assert_eq!(responder.adapter_type(), AdapterType::Responder);
    }
}
