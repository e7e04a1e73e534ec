// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform adapter trait for messaging platform integrations.
//!
//! One implementation exists per platform (WhatsApp, Messenger, Instagram,
//! Telegram, WebChat). An adapter bundles the three platform-specific
//! capabilities the pipeline needs -- webhook verification, payload
//! normalization, and outbound delivery -- so no `platform` string branching
//! leaks into the router.

use async_trait::async_trait;

use crate::error::ChatRelayError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{MessageId, OutboundReply, Platform, ServiceCredentials, WebhookEvent};

/// Adapter for one messaging platform.
///
/// Adapters are stateless with respect to tenants: credentials for the
/// resolved client service are passed into every call, so a single adapter
/// instance serves all tenants bound to its platform.
#[async_trait]
pub trait PlatformAdapter: PluginAdapter {
    /// The platform this adapter serves.
    fn platform(&self) -> Platform;

    /// Verifies webhook authenticity against the exact raw request bytes.
    ///
    /// `signature` is the platform's signature header value, if any. Must
    /// fail closed: missing or malformed signatures return `false`.
    fn verify(&self, raw_body: &[u8], signature: Option<&str>, secret: &str) -> bool;

    /// Unrolls a verified webhook payload into discrete canonical events.
    ///
    /// A payload may contain zero, one, or many events. Unsupported message
    /// types normalize to [`MessageKind::Unsupported`] with a placeholder
    /// instead of being dropped.
    ///
    /// [`MessageKind::Unsupported`]: crate::types::MessageKind::Unsupported
    fn normalize(&self, payload: &serde_json::Value)
    -> Result<Vec<WebhookEvent>, ChatRelayError>;

    /// Delivers an outbound reply through the platform's send API.
    ///
    /// Returns the platform-assigned message id on success. Failures are
    /// classified via [`ChatRelayError::Send`] so the router can apply the
    /// retry policy.
    async fn send(
        &self,
        creds: &ServiceCredentials,
        reply: &OutboundReply,
    ) -> Result<MessageId, ChatRelayError>;

    /// Shows a typing indicator to the contact, where the platform supports it.
    ///
    /// Best-effort; the default implementation is a no-op.
    async fn send_typing(
        &self,
        _creds: &ServiceCredentials,
        _contact_id: &str,
    ) -> Result<(), ChatRelayError> {
        Ok(())
    }
}
