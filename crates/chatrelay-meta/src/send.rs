// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound delivery through the Meta Graph API.
//!
//! One HTTP client serves every tenant; per-service access tokens are
//! supplied per call. Failures are classified for the router's retry
//! policy: 429/5xx and network errors are transient, 401/403 flag the
//! credential, and other 4xx are permanent.

use std::time::Duration;

use chatrelay_config::model::MetaConfig;
use chatrelay_core::error::SendFailureKind;
use chatrelay_core::types::{MessageId, OutboundReply, ServiceCredentials};
use chatrelay_core::ChatRelayError;
use serde::Deserialize;
use tracing::debug;

/// HTTP client for Graph API sends.
#[derive(Debug, Clone)]
pub struct GraphClient {
    client: reqwest::Client,
    base_url: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct WhatsAppSendResponse {
    #[serde(default)]
    messages: Vec<WhatsAppSentMessage>,
}

#[derive(Debug, Deserialize)]
struct WhatsAppSentMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessengerSendResponse {
    message_id: String,
}

impl GraphClient {
    pub fn new(config: &MetaConfig) -> Result<Self, ChatRelayError> {
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
            base_url: config.graph_base_url.trim_end_matches('/').to_string(),
            version: config.graph_version.clone(),
        })
    }

    /// Send a text message through the WhatsApp Cloud API.
    pub async fn send_whatsapp(
        &self,
        creds: &ServiceCredentials,
        reply: &OutboundReply,
    ) -> Result<MessageId, ChatRelayError> {
        let phone_number_id = creds.phone_number_id.as_deref().ok_or_else(|| {
            ChatRelayError::Send {
                kind: SendFailureKind::Permanent,
                message: "service has no phone_number_id credential".into(),
                source: None,
            }
        })?;
        let access_token = require_access_token(creds)?;

        let url = format!(
            "{}/{}/{}/messages",
            self.base_url, self.version, phone_number_id
        );
        let body = serde_json::json!({
            "messaging_product": "whatsapp",
            "to": reply.contact_id,
            "type": "text",
            "text": {"body": reply.content},
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        debug!(status = %status, "WhatsApp send response");
        if !status.is_success() {
            return Err(api_error(status, response.text().await.unwrap_or_default()));
        }

        let parsed: WhatsAppSendResponse =
            response.json().await.map_err(|e| ChatRelayError::Send {
                kind: SendFailureKind::Transient,
                message: format!("failed to parse WhatsApp send response: {e}"),
                source: Some(Box::new(e)),
            })?;
        let id = parsed
            .messages
            .first()
            .map(|m| m.id.clone())
            .ok_or_else(|| ChatRelayError::Send {
                kind: SendFailureKind::Transient,
                message: "WhatsApp send response carried no message id".into(),
                source: None,
            })?;
        Ok(MessageId(id))
    }

    /// Send a text message through the Messenger/Instagram Send API.
    pub async fn send_messenger(
        &self,
        creds: &ServiceCredentials,
        reply: &OutboundReply,
    ) -> Result<MessageId, ChatRelayError> {
        let access_token = require_access_token(creds)?;

        let url = format!("{}/{}/me/messages", self.base_url, self.version);
        let body = serde_json::json!({
            "recipient": {"id": reply.contact_id},
            "messaging_type": "RESPONSE",
            "message": {"text": reply.content},
        });

        let response = self
            .client
            .post(&url)
            .query(&[("access_token", access_token)])
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        debug!(status = %status, "Messenger send response");
        if !status.is_success() {
            return Err(api_error(status, response.text().await.unwrap_or_default()));
        }

        let parsed: MessengerSendResponse =
            response.json().await.map_err(|e| ChatRelayError::Send {
                kind: SendFailureKind::Transient,
                message: format!("failed to parse Messenger send response: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(MessageId(parsed.message_id))
    }

    /// Show the typing indicator to a Messenger/Instagram contact.
    pub async fn send_messenger_typing(
        &self,
        creds: &ServiceCredentials,
        contact_id: &str,
    ) -> Result<(), ChatRelayError> {
        let access_token = require_access_token(creds)?;
        let url = format!("{}/{}/me/messages", self.base_url, self.version);
        let body = serde_json::json!({
            "recipient": {"id": contact_id},
            "sender_action": "typing_on",
        });

        let response = self
            .client
            .post(&url)
            .query(&[("access_token", access_token)])
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

fn require_access_token(creds: &ServiceCredentials) -> Result<&str, ChatRelayError> {
    creds
        .access_token
        .as_deref()
        .ok_or_else(|| ChatRelayError::Send {
            kind: SendFailureKind::Auth,
            message: "service has no access token".into(),
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
        message: format!("Graph API returned {status}: {body}"),
        source: None,
    }
}

/// Retry classification of a Graph API status code.
fn classify_status(status: reqwest::StatusCode) -> SendFailureKind {
    match status.as_u16() {
        401 | 403 => SendFailureKind::Auth,
        429 => SendFailureKind::Transient,
        s if s >= 500 => SendFailureKind::Transient,
        _ => SendFailureKind::Permanent,
    }
}
