// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The inbound pipeline: verify -> normalize -> resolve -> store -> dispatch.
//!
//! `prepare` runs the cheap synchronous stages (resolution, signature
//! verification, normalization) so the gateway can pick the right HTTP
//! status and acknowledge the platform sub-second; `process` runs the
//! stored/dispatched tail and is meant to be spawned after the response is
//! on the wire. Platform-specific payload peeking (e.g. Meta's page id)
//! stays in the gateway -- the pipeline only sees (platform, identifier).

use std::sync::Arc;

use chatrelay_core::ChatRelayError;
use chatrelay_core::types::{Platform, StatusUpdate, WebhookEvent};
use chatrelay_storage::ClientService;
use tracing::{debug, error};

use crate::dispatch::DispatchRouter;
use crate::registry::AdapterRegistry;
use crate::resolver::TenantResolver;
use crate::tracker::DeliveryTracker;

/// Why a webhook was not accepted into the pipeline.
///
/// The gateway maps these onto platform-expected HTTP statuses: bad
/// signatures reject with 401, everything else acknowledges with 200 so
/// the platform stops retrying a request we will never accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookRejection {
    BadSignature,
    UnknownTenant,
    Malformed,
}

/// A verified, normalized webhook ready for asynchronous processing.
pub struct PreparedWebhook {
    pub service: Arc<ClientService>,
    pub events: Vec<WebhookEvent>,
}

/// Outcome of the synchronous pipeline stages.
pub enum Ingest {
    Accepted(PreparedWebhook),
    Rejected(WebhookRejection),
}

pub struct InboundPipeline {
    resolver: Arc<TenantResolver>,
    registry: Arc<AdapterRegistry>,
    dispatcher: Arc<DispatchRouter>,
    tracker: Arc<DeliveryTracker>,
}

impl InboundPipeline {
    pub fn new(
        resolver: Arc<TenantResolver>,
        registry: Arc<AdapterRegistry>,
        dispatcher: Arc<DispatchRouter>,
        tracker: Arc<DeliveryTracker>,
    ) -> Self {
        Self {
            resolver,
            registry,
            dispatcher,
            tracker,
        }
    }

    pub fn resolver(&self) -> &Arc<TenantResolver> {
        &self.resolver
    }

    pub fn dispatcher(&self) -> &Arc<DispatchRouter> {
        &self.dispatcher
    }

    /// Run the synchronous stages for one webhook call.
    pub async fn prepare(
        &self,
        platform: Platform,
        identifier: &str,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<Ingest, ChatRelayError> {
        let Some(service) = self.resolver.resolve(platform, identifier).await? else {
            return Ok(Ingest::Rejected(WebhookRejection::UnknownTenant));
        };

        let adapter = self.registry.get(platform)?;

        let secret = match secret_for(platform, &service) {
            Some(secret) => secret,
            None if platform.is_meta() => {
                // A Meta service without an app secret cannot be verified.
                return Ok(Ingest::Rejected(WebhookRejection::BadSignature));
            }
            None => String::new(),
        };

        if !adapter.verify(raw_body, signature, &secret) {
            return Ok(Ingest::Rejected(WebhookRejection::BadSignature));
        }

        let Ok(payload) = serde_json::from_slice::<serde_json::Value>(raw_body) else {
            return Ok(Ingest::Rejected(WebhookRejection::Malformed));
        };

        let events = adapter.normalize(&payload)?;
        debug!(
            platform = %platform,
            service_id = service.id.as_str(),
            events = events.len(),
            "webhook accepted"
        );
        Ok(Ingest::Accepted(PreparedWebhook { service, events }))
    }

    /// Process an accepted webhook's events in arrival order.
    ///
    /// Individual event failures are logged and do not abort the rest of
    /// the batch -- the platform has already been acknowledged.
    pub async fn process(&self, prepared: PreparedWebhook) {
        for event in &prepared.events {
            match event {
                WebhookEvent::Message(inbound) => {
                    if let Err(e) = self
                        .dispatcher
                        .handle_inbound(&prepared.service, inbound)
                        .await
                    {
                        error!(
                            service_id = prepared.service.id.as_str(),
                            error = %e,
                            "failed to dispatch inbound message"
                        );
                    }
                }
                WebhookEvent::Status(update) => {
                    if let Err(e) = self.tracker.record_status(update).await {
                        error!(
                            external_id = update.external_id.as_str(),
                            error = %e,
                            "failed to record delivery status"
                        );
                    }
                }
            }
        }
    }

    /// Record a delivery-status callback arriving outside a platform
    /// webhook (the internal status endpoint).
    pub async fn record_status(&self, update: &StatusUpdate) -> Result<(), ChatRelayError> {
        self.tracker.record_status(update).await
    }
}

/// The per-platform webhook verification secret.
fn secret_for(platform: Platform, service: &ClientService) -> Option<String> {
    match platform {
        Platform::WhatsApp | Platform::Messenger | Platform::Instagram => {
            service.credentials.app_secret.clone()
        }
        Platform::Telegram => Some(
            service
                .credentials
                .webhook_secret
                .clone()
                .unwrap_or_default(),
        ),
        Platform::WebChat => Some(String::new()),
    }
}
