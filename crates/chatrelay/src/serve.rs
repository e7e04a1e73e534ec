// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server wiring: construct every component explicitly and inject it.
//!
//! Nothing here is a module-level singleton -- the full pipeline is built
//! from configuration, so tests (and future multi-instance setups) can
//! wire their own with fake adapters and a scratch database.

use std::sync::Arc;
use std::time::Instant;

use chatrelay_ai::AiResponder;
use chatrelay_config::ChatRelayConfig;
use chatrelay_core::ChatRelayError;
use chatrelay_core::traits::{Broadcaster, ResponderAdapter};
use chatrelay_core::types::Platform;
use chatrelay_gateway::{AuthConfig, GatewayState, HealthState, RoomRegistry, WebChatChannel};
use chatrelay_meta::MetaChannel;
use chatrelay_router::{
    AdapterRegistry, DeliveryTracker, DispatchPolicy, DispatchRouter, InboundPipeline,
    TenantResolver,
};
use chatrelay_storage::{ConversationStore, Database, StoreLimits};
use chatrelay_telegram::TelegramChannel;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Build the full gateway state from configuration.
pub async fn build_state(config: &ChatRelayConfig) -> Result<GatewayState, ChatRelayError> {
    let db = Database::open(&config.storage.database_path).await?;
    let store = Arc::new(ConversationStore::new(db, StoreLimits::from(&config.limits)));

    let mut registry = AdapterRegistry::new();
    for platform in [Platform::WhatsApp, Platform::Messenger, Platform::Instagram] {
        registry.register(Arc::new(MetaChannel::new(platform, &config.meta)?));
    }
    registry.register(Arc::new(TelegramChannel::new(&config.telegram)?));
    registry.register(Arc::new(WebChatChannel));
    let registry = Arc::new(registry);

    let rooms = Arc::new(RoomRegistry::new());
    let bus: Arc<dyn Broadcaster> = rooms.clone();

    let responder: Option<Arc<dyn ResponderAdapter>> = if config.responder.api_key.is_some() {
        Some(Arc::new(AiResponder::new(&config.responder)?))
    } else {
        warn!("responder.api_key not set -- all conversations route to human operators");
        None
    };

    let resolver = Arc::new(TenantResolver::new(store.clone()));
    let dispatcher = Arc::new(DispatchRouter::new(
        store.clone(),
        registry.clone(),
        responder,
        bus.clone(),
        DispatchPolicy::from_config(config),
    ));
    let tracker = Arc::new(DeliveryTracker::new(store.clone(), bus));
    let pipeline = Arc::new(InboundPipeline::new(resolver, registry, dispatcher, tracker));

    Ok(GatewayState {
        pipeline,
        store,
        rooms,
        auth: AuthConfig {
            bearer_token: config.server.bearer_token.clone(),
            webhook_key: config.server.webhook_key.clone(),
        },
        health: HealthState {
            start_time: Instant::now(),
        },
    })
}

/// Run the server until ctrl-c.
pub async fn run(config: ChatRelayConfig) -> Result<(), ChatRelayError> {
    let state = build_state(&config).await?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal_cancel.cancel();
        }
    });

    chatrelay_gateway::start_server(&config.server, state, cancel).await
}
