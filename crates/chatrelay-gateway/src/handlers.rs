// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers: webhook endpoints, internal API, operator read API.
//!
//! Webhook handlers follow the ack-first pattern: the synchronous stages
//! (resolution, signature verification, normalization) pick the HTTP
//! status, then the stored/dispatched tail is spawned so the platform gets
//! its response sub-second. Verification and parsing failures never
//! surface as 5xx -- Meta and Telegram retry on 5xx, and a payload we
//! cannot accept today will not parse better tomorrow.

use std::collections::HashMap;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chatrelay_core::types::{DeliveryStatus, Platform, SenderKind, StatusUpdate};
use chatrelay_meta::normalize::{object_platform, platform_identifier};
use chatrelay_router::{Ingest, WebhookRejection};
use chatrelay_storage::{Conversation, StoredMessage};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::server::GatewayState;

const EVENT_RECEIVED: &str = "EVENT_RECEIVED";

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

// --- Health -----------------------------------------------------------------

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// GET /health -- unauthenticated, for process supervision.
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
    })
}

// --- Meta webhook -----------------------------------------------------------

/// GET /webhooks/meta -- Meta's subscription verification handshake.
///
/// Echoes `hub.challenge` verbatim when `hub.mode=subscribe` and
/// `hub.verify_token` matches a configured client service.
pub async fn meta_verify(
    State(state): State<GatewayState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);
    let challenge = params.get("hub.challenge").cloned();

    if mode != Some("subscribe") {
        return StatusCode::FORBIDDEN.into_response();
    }
    let (Some(token), Some(challenge)) = (token, challenge) else {
        return StatusCode::FORBIDDEN.into_response();
    };

    match state.store.find_meta_service_by_verify_token(token).await {
        Ok(Some(service)) => {
            debug!(service_id = service.id.as_str(), "Meta handshake verified");
            (StatusCode::OK, challenge).into_response()
        }
        Ok(None) => {
            warn!(event = "unmatched_webhook", "Meta handshake token matched no service");
            StatusCode::FORBIDDEN.into_response()
        }
        Err(e) => {
            error!(error = %e, "Meta handshake lookup failed");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// POST /webhooks/meta -- the unified webhook for WhatsApp, Messenger, and
/// Instagram.
///
/// The raw bytes are captured before any JSON parsing so the HMAC runs
/// over exactly what Meta signed.
pub async fn meta_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok())
        .map(str::trim);

    // Peek the payload for the routing identifier. The raw bytes stay
    // untouched for verification inside the pipeline.
    let Ok(payload) = serde_json::from_slice::<serde_json::Value>(&body) else {
        warn!("unparsable Meta webhook body");
        return (StatusCode::OK, EVENT_RECEIVED).into_response();
    };
    let Some(platform) = object_platform(&payload) else {
        debug!("Meta webhook for an unhandled object type");
        return (StatusCode::OK, EVENT_RECEIVED).into_response();
    };
    let Some(identifier) = platform_identifier(&payload) else {
        warn!(event = "unmatched_webhook", platform = %platform, "Meta webhook carried no identifier");
        return (StatusCode::OK, EVENT_RECEIVED).into_response();
    };

    match state
        .pipeline
        .prepare(platform, &identifier, &body, signature)
        .await
    {
        Ok(Ingest::Accepted(prepared)) => {
            let pipeline = state.pipeline.clone();
            tokio::spawn(async move {
                pipeline.process(prepared).await;
            });
            (StatusCode::OK, EVENT_RECEIVED).into_response()
        }
        Ok(Ingest::Rejected(WebhookRejection::BadSignature)) => {
            warn!(platform = %platform, identifier = identifier.as_str(), "Meta webhook signature rejected");
            StatusCode::UNAUTHORIZED.into_response()
        }
        Ok(Ingest::Rejected(_)) => (StatusCode::OK, EVENT_RECEIVED).into_response(),
        Err(e) => {
            // Already acknowledged territory: never bounce a 5xx back at Meta.
            error!(error = %e, "Meta webhook pipeline error");
            (StatusCode::OK, EVENT_RECEIVED).into_response()
        }
    }
}

// --- Telegram webhook -------------------------------------------------------

/// POST /webhooks/telegram/{token} -- one Bot API update per call.
///
/// The bot token in the path is both the authenticity secret and the
/// tenant-resolution key.
pub async fn telegram_webhook(
    State(state): State<GatewayState>,
    Path(token): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let secret_header = headers
        .get("x-telegram-bot-api-secret-token")
        .and_then(|v| v.to_str().ok());

    match state
        .pipeline
        .prepare(Platform::Telegram, &token, &body, secret_header)
        .await
    {
        Ok(Ingest::Accepted(prepared)) => {
            let pipeline = state.pipeline.clone();
            tokio::spawn(async move {
                pipeline.process(prepared).await;
            });
            StatusCode::OK.into_response()
        }
        Ok(Ingest::Rejected(WebhookRejection::BadSignature)) => {
            warn!("Telegram webhook secret token rejected");
            StatusCode::UNAUTHORIZED.into_response()
        }
        Ok(Ingest::Rejected(_)) => StatusCode::OK.into_response(),
        Err(e) => {
            error!(error = %e, "Telegram webhook pipeline error");
            StatusCode::OK.into_response()
        }
    }
}

// --- Internal endpoints -----------------------------------------------------

fn webhook_key_ok(
    state: &GatewayState,
    headers: &HeaderMap,
    params: &HashMap<String, String>,
) -> bool {
    let header = headers.get("x-webhook-key").and_then(|v| v.to_str().ok());
    let query = params.get("key").map(String::as_str);
    state.auth.webhook_key_matches(header, query)
}

/// Request body for POST /internal/messages.
#[derive(Debug, Deserialize)]
pub struct InternalMessageRequest {
    pub service_id: String,
    pub conversation_id: String,
    pub content: String,
    /// Defaults to `human` (operator-authored).
    #[serde(default)]
    pub sender: Option<SenderKind>,
}

/// POST /internal/messages -- manual/automation-triggered message injection.
///
/// The message persists as an operator message and is delivered through
/// the platform adapter with the normal retry policy.
pub async fn post_internal_message(
    State(state): State<GatewayState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<InternalMessageRequest>,
) -> Response {
    if !webhook_key_ok(&state, &headers, &params) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let service = match state.store.service(&body.service_id).await {
        Ok(Some(service)) => service,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "unknown service"),
        Err(e) => {
            error!(error = %e, "service lookup failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "lookup failed");
        }
    };

    match state.store.conversation(&body.conversation_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "unknown conversation"),
        Err(e) => {
            error!(error = %e, "conversation lookup failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "lookup failed");
        }
    }

    let sender = body.sender.unwrap_or(SenderKind::Human);
    match state
        .pipeline
        .dispatcher()
        .handle_operator_message(&service, &body.conversation_id, sender, &body.content)
        .await
    {
        Ok(message) => (StatusCode::OK, Json(message)).into_response(),
        Err(e) => {
            error!(error = %e, "internal message dispatch failed");
            error_response(StatusCode::BAD_GATEWAY, &e.to_string())
        }
    }
}

/// Request body for POST /internal/status.
#[derive(Debug, Deserialize)]
pub struct InternalStatusRequest {
    pub platform: Platform,
    pub external_message_id: String,
    pub status: DeliveryStatus,
}

/// POST /internal/status -- delivery-status callbacks from automation.
///
/// Unmatched ids are logged and discarded, so this always acknowledges.
pub async fn post_internal_status(
    State(state): State<GatewayState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<InternalStatusRequest>,
) -> Response {
    if !webhook_key_ok(&state, &headers, &params) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let update = StatusUpdate {
        platform: body.platform,
        external_id: body.external_message_id,
        status: body.status,
        timestamp: None,
    };
    match state.pipeline.record_status(&update).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            error!(error = %e, "internal status recording failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "status recording failed")
        }
    }
}

/// POST /internal/services/{id}/invalidate -- drop resolver cache entries
/// after an external credential update.
pub async fn post_invalidate_service(
    State(state): State<GatewayState>,
    Path(service_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !webhook_key_ok(&state, &headers, &params) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    state.pipeline.resolver().invalidate_service(&service_id);
    StatusCode::NO_CONTENT.into_response()
}

// --- Operator read API ------------------------------------------------------

/// Response body for GET /v1/conversations.
#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<Conversation>,
}

/// GET /v1/conversations?service_id=...&limit=...
pub async fn get_conversations(
    State(state): State<GatewayState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(service_id) = params.get("service_id") else {
        return error_response(StatusCode::BAD_REQUEST, "service_id is required");
    };
    let limit = params
        .get("limit")
        .and_then(|l| l.parse::<i64>().ok())
        .unwrap_or(50);

    match state.store.conversations_for_service(service_id, limit).await {
        Ok(conversations) => {
            (StatusCode::OK, Json(ConversationListResponse { conversations })).into_response()
        }
        Err(e) => {
            error!(error = %e, "conversation listing failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "listing failed")
        }
    }
}

/// Response body for GET /v1/conversations/{id}/messages.
#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<StoredMessage>,
}

/// GET /v1/conversations/{id}/messages?limit=...
pub async fn get_conversation_messages(
    State(state): State<GatewayState>,
    Path(conversation_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let limit = params.get("limit").and_then(|l| l.parse::<i64>().ok());

    match state.store.conversation(&conversation_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "unknown conversation"),
        Err(e) => {
            error!(error = %e, "conversation lookup failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "lookup failed");
        }
    }

    match state.store.messages(&conversation_id, limit).await {
        Ok(messages) => (StatusCode::OK, Json(MessageListResponse { messages })).into_response(),
        Err(e) => {
            error!(error = %e, "message listing failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "listing failed")
        }
    }
}
