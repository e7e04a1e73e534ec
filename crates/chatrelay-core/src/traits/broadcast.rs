// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Broadcaster trait for realtime fan-out to operator/browser sessions.
//!
//! Delivery is best-effort, at-most-once per connected subscriber, with no
//! persistence or replay. Disconnected clients re-fetch state through the
//! read API on reconnect.

use crate::types::Platform;

/// Room shared by every admin-panel session.
pub const ADMIN_ROOM: &str = "admin_panel";

/// Room for all operator sessions watching one tenant/platform service.
pub fn service_room(tenant_id: &str, platform: Platform) -> String {
    format!("service_{tenant_id}_{}", platform.code())
}

/// Room for sessions watching a single conversation (operators and, for
/// WebChat, the end user's widget).
pub fn conversation_room(conversation_id: &str) -> String {
    format!("conversation_{conversation_id}")
}

/// Publisher of realtime state-change events into named rooms.
///
/// `publish` is synchronous and non-blocking: implementations enqueue into
/// per-connection channels and drop on backpressure rather than await.
pub trait Broadcaster: Send + Sync + 'static {
    /// Publishes `event` with `payload` to every subscriber of `room`.
    fn publish(&self, room: &str, event: &str, payload: serde_json::Value);
}
