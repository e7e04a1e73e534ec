// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the completion API.
//!
//! Provides [`CompletionClient`] which handles request construction,
//! authentication, bounded timeouts, and transient error retry. The
//! fallback-reply policy on failure belongs to the dispatch router, not
//! here -- this client reports failures faithfully.

use std::time::Duration;

use chatrelay_config::model::ResponderConfig;
use chatrelay_core::ChatRelayError;
use chatrelay_core::traits::responder::CompletionRequest;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// HTTP client for completion API communication.
///
/// Manages authentication headers, connection pooling, and retry logic for
/// transient errors (429, 500, 503, 529).
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    max_retries: u32,
}

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [ApiMessage],
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type")]
    type_: String,
    message: String,
}

impl CompletionClient {
    /// Creates a new completion API client from config.
    ///
    /// Requires `responder.api_key` to be set.
    pub fn new(config: &ResponderConfig) -> Result<Self, ChatRelayError> {
        let api_key = config.api_key.as_deref().ok_or_else(|| {
            ChatRelayError::Config("responder.api_key is required for the AI responder".into())
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key).map_err(|e| {
                ChatRelayError::Config(format!("invalid API key header value: {e}"))
            })?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChatRelayError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_retries: 1,
        })
    }

    /// Sends a completion request and returns the concatenated text blocks.
    ///
    /// On transient errors (429, 500, 503, 529), retries once after a
    /// 1-second delay.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<String, ChatRelayError> {
        let messages: Vec<ApiMessage> = request
            .messages
            .iter()
            .map(|turn| ApiMessage {
                role: turn.role.clone(),
                content: turn.content.clone(),
            })
            .collect();
        let body = ApiRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: request.system.as_deref(),
            messages: &messages,
        };

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying completion request after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let response = self
                .client
                .post(&self.base_url)
                .json(&body)
                .send()
                .await
                .map_err(|e| ChatRelayError::Provider {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, "completion response received");

            if status.is_success() {
                let parsed: ApiResponse =
                    response.json().await.map_err(|e| ChatRelayError::Provider {
                        message: format!("failed to parse API response: {e}"),
                        source: Some(Box::new(e)),
                    })?;
                let text: String = parsed
                    .content
                    .iter()
                    .filter(|block| block.kind.as_deref() == Some("text"))
                    .filter_map(|block| block.text.as_deref())
                    .collect();
                if text.is_empty() {
                    return Err(ChatRelayError::Provider {
                        message: "completion response carried no text".into(),
                        source: None,
                    });
                }
                return Ok(text);
            }

            if is_transient_error(status) && attempt < self.max_retries {
                let body = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %body, "transient error, will retry");
                last_error = Some(ChatRelayError::Provider {
                    message: format!("API returned {status}: {body}"),
                    source: None,
                });
                continue;
            }

            // Non-transient error or exhausted retries.
            let body = response.text().await.unwrap_or_default();
            let message = if let Ok(api_err) = serde_json::from_str::<ApiErrorResponse>(&body) {
                format!(
                    "completion API error ({}): {}",
                    api_err.error.type_, api_err.error.message
                )
            } else {
                format!("API returned {status}: {body}")
            };
            return Err(ChatRelayError::Provider {
                message,
                source: None,
            });
        }

        Err(last_error.unwrap_or_else(|| ChatRelayError::Provider {
            message: "completion request failed after retries".into(),
            source: None,
        }))
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503 | 529)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatrelay_core::traits::responder::ChatTurn;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> CompletionClient {
        let config = ResponderConfig {
            base_url: base_url.to_string(),
            api_key: Some("test-api-key".into()),
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: 256,
            timeout_secs: 5,
            history_limit: 20,
            fallback_message: "fallback".into(),
        };
        CompletionClient::new(&config).unwrap()
    }

    fn test_request() -> CompletionRequest {
        CompletionRequest {
            system: Some("You are a store assistant.".into()),
            messages: vec![ChatTurn {
                role: "user".into(),
                content: "opening hours?".into(),
            }],
        }
    }

    #[test]
    fn new_requires_api_key() {
        let config = ResponderConfig::default();
        assert!(CompletionClient::new(&config).is_err());
    }

    #[tokio::test]
    async fn complete_success_concatenates_text_blocks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("x-api-key", "test-api-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg_test",
                "content": [
                    {"type": "text", "text": "We open "},
                    {"type": "text", "text": "at 9am."}
                ],
                "stop_reason": "end_turn"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let text = client.complete(&test_request()).await.unwrap();
        assert_eq!(text, "We open at 9am.");
    }

    #[tokio::test]
    async fn complete_retries_on_429() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"type": "rate_limit_error", "message": "Rate limited"}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": "after retry"}]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let text = client.complete(&test_request()).await.unwrap();
        assert_eq!(text, "after retry");
    }

    #[tokio::test]
    async fn complete_fails_on_400_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"type": "invalid_request_error", "message": "Bad model"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.complete(&test_request()).await.unwrap_err();
        assert!(err.to_string().contains("invalid_request_error"), "got: {err}");
    }

    #[tokio::test]
    async fn complete_exhausts_retries_on_503() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": {"type": "overloaded_error", "message": "Service overloaded"}
            })))
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.complete(&test_request()).await.unwrap_err();
        assert!(err.to_string().contains("overloaded_error"), "got: {err}");
    }

    #[tokio::test]
    async fn empty_content_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": []
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(client.complete(&test_request()).await.is_err());
    }
}
