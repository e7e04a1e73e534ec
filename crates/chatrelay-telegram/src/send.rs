// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound delivery through the Telegram Bot API.
//!
//! Sends go directly against `https://api.telegram.org/bot{token}/...`
//! with the per-tenant bot token supplied on every call. Failures are
//! classified for the router's retry policy the same way as Graph API
//! sends: 429/5xx and network errors are transient, 401/403 flag the
//! credential, other 4xx are permanent.

use std::time::Duration;

use chatrelay_config::model::TelegramConfig;
use chatrelay_core::ChatRelayError;
use chatrelay_core::error::SendFailureKind;
use chatrelay_core::types::{MessageId, OutboundReply, ServiceCredentials};
use serde::Deserialize;
use tracing::debug;

/// HTTP client for Bot API sends.
#[derive(Debug, Clone)]
pub struct BotApiClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

impl BotApiClient {
    pub fn new(config: &TelegramConfig) -> Result<Self, ChatRelayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.send_timeout_secs))
            .build()
            .map_err(|e| ChatRelayError::Send {
                kind: SendFailureKind::Permanent,
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Send a text message to a chat.
    pub async fn send_message(
        &self,
        creds: &ServiceCredentials,
        reply: &OutboundReply,
    ) -> Result<MessageId, ChatRelayError> {
        let token = require_bot_token(creds)?;
        let url = format!("{}/bot{}/sendMessage", self.base_url, token);
        let body = serde_json::json!({
            "chat_id": reply.contact_id,
            "text": reply.content,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        debug!(status = %status, "Telegram send response");
        if !status.is_success() {
            return Err(api_error(status, response.text().await.unwrap_or_default()));
        }

        let parsed: ApiResponse<SentMessage> =
            response.json().await.map_err(|e| ChatRelayError::Send {
                kind: SendFailureKind::Transient,
                message: format!("failed to parse Telegram send response: {e}"),
                source: Some(Box::new(e)),
            })?;

        match parsed.result {
            Some(sent) if parsed.ok => Ok(MessageId(sent.message_id.to_string())),
            _ => Err(ChatRelayError::Send {
                kind: SendFailureKind::Permanent,
                message: format!(
                    "Telegram rejected the send: {}",
                    parsed.description.unwrap_or_else(|| "no description".into())
                ),
                source: None,
            }),
        }
    }

    /// Show the typing indicator in a chat.
    pub async fn send_typing(
        &self,
        creds: &ServiceCredentials,
        contact_id: &str,
    ) -> Result<(), ChatRelayError> {
        let token = require_bot_token(creds)?;
        let url = format!("{}/bot{}/sendChatAction", self.base_url, token);
        let body = serde_json::json!({
            "chat_id": contact_id,
            "action": "typing",
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(api_error(status, response.text().await.unwrap_or_default()));
        }
        Ok(())
    }
}

fn require_bot_token(creds: &ServiceCredentials) -> Result<&str, ChatRelayError> {
    creds.bot_token.as_deref().ok_or_else(|| ChatRelayError::Send {
        kind: SendFailureKind::Auth,
        message: "service has no bot token".into(),
        source: None,
    })
}

fn map_transport_error(e: reqwest::Error) -> ChatRelayError {
    if e.is_timeout() {
        ChatRelayError::Timeout {
            duration: Duration::from_secs(0),
        }
    } else {
        ChatRelayError::Send {
            kind: SendFailureKind::Transient,
            message: format!("HTTP request failed: {e}"),
            source: Some(Box::new(e)),
        }
    }
}

fn api_error(status: reqwest::StatusCode, body: String) -> ChatRelayError {
    ChatRelayError::Send {
        kind: classify_status(status),
        message: format!("Bot API returned {status}: {body}"),
        source: None,
    }
}

fn classify_status(status: reqwest::StatusCode) -> SendFailureKind {
    match status.as_u16() {
        401 | 403 => SendFailureKind::Auth,
        429 => SendFailureKind::Transient,
        s if s >= 500 => SendFailureKind::Transient,
        _ => SendFailureKind::Permanent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> BotApiClient {
        let config = TelegramConfig {
            api_base_url: base_url.to_string(),
            send_timeout_secs: 5,
        };
        BotApiClient::new(&config).unwrap()
    }

    fn creds() -> ServiceCredentials {
        ServiceCredentials {
            bot_token: Some("12345:TESTTOKEN".into()),
            ..Default::default()
        }
    }

    fn reply() -> OutboundReply {
        OutboundReply {
            contact_id: "5512345".into(),
            content: "hello from the bot".into(),
        }
    }

    #[tokio::test]
    async fn send_message_success_returns_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot12345:TESTTOKEN/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "5512345",
                "text": "hello from the bot",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {"message_id": 556, "date": 1767225600, "chat": {"id": 5512345, "type": "private"}}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let id = client.send_message(&creds(), &reply()).await.unwrap();
        assert_eq!(id.0, "556");
    }

    #[tokio::test]
    async fn send_message_401_is_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot12345:TESTTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "ok": false, "error_code": 401, "description": "Unauthorized"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.send_message(&creds(), &reply()).await.unwrap_err();
        assert_eq!(err.send_kind(), Some(SendFailureKind::Auth));
    }

    #[tokio::test]
    async fn send_message_429_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot12345:TESTTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "ok": false, "error_code": 429, "description": "Too Many Requests: retry after 3",
                "parameters": {"retry_after": 3}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.send_message(&creds(), &reply()).await.unwrap_err();
        assert_eq!(err.send_kind(), Some(SendFailureKind::Transient));
    }

    #[tokio::test]
    async fn send_message_400_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot12345:TESTTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false, "error_code": 400, "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.send_message(&creds(), &reply()).await.unwrap_err();
        assert_eq!(err.send_kind(), Some(SendFailureKind::Permanent));
    }

    #[tokio::test]
    async fn missing_bot_token_is_auth_failure() {
        let client = test_client("http://localhost:1");
        let err = client
            .send_message(&ServiceCredentials::default(), &reply())
            .await
            .unwrap_err();
        assert_eq!(err.send_kind(), Some(SendFailureKind::Auth));
    }

    #[tokio::test]
    async fn typing_posts_chat_action() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot12345:TESTTOKEN/sendChatAction"))
            .and(body_partial_json(serde_json::json!({"action": "typing"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true, "result": true
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        client.send_typing(&creds(), "5512345").await.unwrap();
    }
}
