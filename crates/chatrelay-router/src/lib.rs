// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound pipeline and dispatch routing for ChatRelay.
//!
//! This crate owns everything between a verified webhook and an outbound
//! reply: tenant resolution with caching, the per-conversation bot/human
//! dispatch state machine, bounded-backoff outbound delivery, and the
//! delivery tracker. The pipeline is explicitly constructed and injected --
//! there is no module-level singleton, so tests wire it up with fake
//! adapters and a scratch database.

pub mod dispatch;
pub mod outbound;
pub mod pipeline;
pub mod registry;
pub mod resolver;
pub mod tracker;

pub use dispatch::{DispatchOutcome, DispatchPolicy, DispatchRouter};
pub use pipeline::{InboundPipeline, Ingest, PreparedWebhook, WebhookRejection};
pub use registry::AdapterRegistry;
pub use resolver::TenantResolver;
pub use tracker::DeliveryTracker;
