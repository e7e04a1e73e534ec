// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state. Route groups:
//! - Public: `/health`, the platform webhook endpoints, `/ws`.
//! - Internal: `/internal/*`, guarded by the static webhook key inside the
//!   handlers (the key may arrive as a query param, which middleware
//!   cannot see uniformly).
//! - Operator API: `/v1/*`, behind bearer-token middleware.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, post},
};
use chatrelay_config::model::ServerConfig;
use chatrelay_core::ChatRelayError;
use chatrelay_router::InboundPipeline;
use chatrelay_storage::ConversationStore;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::auth::{AuthConfig, bearer_middleware};
use crate::handlers;
use crate::rooms::RoomRegistry;
use crate::ws;

/// Health state for the unauthenticated health endpoint.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: Instant,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub pipeline: Arc<InboundPipeline>,
    pub store: Arc<ConversationStore>,
    pub rooms: Arc<RoomRegistry>,
    pub auth: AuthConfig,
    pub health: HealthState,
}

/// Build the full gateway router over the given state.
pub fn build_router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route(
            "/webhooks/meta",
            get(handlers::meta_verify).post(handlers::meta_webhook),
        )
        .route("/webhooks/telegram/{token}", post(handlers::telegram_webhook))
        .route("/internal/messages", post(handlers::post_internal_message))
        .route("/internal/status", post(handlers::post_internal_status))
        .route(
            "/internal/services/{id}/invalidate",
            post(handlers::post_invalidate_service),
        )
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/conversations", get(handlers::get_conversations))
        .route(
            "/v1/conversations/{id}/messages",
            get(handlers::get_conversation_messages),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            bearer_middleware,
        ))
        .with_state(state.clone());

    // WebSocket route (auth happens during handshake, not via middleware).
    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(CorsLayer::permissive())
}

/// Start the gateway server; runs until the cancellation token fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), ChatRelayError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ChatRelayError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| ChatRelayError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}
