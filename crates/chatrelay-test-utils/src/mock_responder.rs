// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock AI responder for deterministic testing.
//!
//! Responses pop from a FIFO queue; an empty queue yields a default text.
//! `fail_next()` scripts an explicit provider failure so tests can
//! exercise the fallback-reply path.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chatrelay_core::ChatRelayError;
use chatrelay_core::traits::responder::CompletionRequest;
use chatrelay_core::traits::{PluginAdapter, ResponderAdapter};
use chatrelay_core::types::{AdapterType, HealthStatus};

pub struct MockResponder {
    responses: Mutex<VecDeque<String>>,
    fail_next: Mutex<bool>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockResponder {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fail_next: Mutex::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_responses(responses: Vec<String>) -> Self {
        let responder = Self::new();
        *responder.responses.lock().unwrap() = VecDeque::from(responses);
        responder
    }

    /// Queue one more response.
    pub fn add_response(&self, text: impl Into<String>) {
        self.responses.lock().unwrap().push_back(text.into());
    }

    /// Make the next `complete` call fail.
    pub fn fail_next(&self) {
        *self.fail_next.lock().unwrap() = true;
    }

    /// Every request the responder has seen, for prompt assertions.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockResponder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockResponder {
    fn name(&self) -> &str {
        "mock-responder"
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
impl ResponderAdapter for MockResponder {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ChatRelayError> {
        self.requests.lock().unwrap().push(request);

        if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
            return Err(ChatRelayError::Provider {
                message: "mock provider failure".into(),
                source: None,
            });
        }

        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "mock completion".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatrelay_core::traits::responder::ChatTurn;

    fn request(text: &str) -> CompletionRequest {
        CompletionRequest {
            system: None,
            messages: vec![ChatTurn {
                role: "user".into(),
                content: text.into(),
            }],
        }
    }

    #[tokio::test]
    async fn responses_pop_in_order() {
        let responder = MockResponder::with_responses(vec!["first".into(), "second".into()]);
        assert_eq!(responder.complete(request("a")).await.unwrap(), "first");
        assert_eq!(responder.complete(request("b")).await.unwrap(), "second");
        assert_eq!(responder.complete(request("c")).await.unwrap(), "mock completion");
    }

    #[tokio::test]
    async fn fail_next_fails_exactly_once() {
        let responder = MockResponder::with_responses(vec!["ok".into()]);
        responder.fail_next();
        assert!(responder.complete(request("a")).await.is_err());
        assert_eq!(responder.complete(request("b")).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn requests_are_recorded() {
        let responder = MockResponder::new();
        responder.complete(request("recorded?")).await.unwrap();
        let seen = responder.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].messages[0].content, "recorded?");
    }
}
