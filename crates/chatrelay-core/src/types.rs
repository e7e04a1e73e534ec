// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical types shared across the ChatRelay pipeline.
//!
//! Every platform adapter normalizes its webhook payloads into these types;
//! everything downstream of the normalizer (store, router, broadcaster) is
//! platform-agnostic.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a message as assigned by the external platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// A messaging platform a tenant can bind a client service to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    WhatsApp,
    Messenger,
    Instagram,
    Telegram,
    WebChat,
}

impl Platform {
    /// Short code used in realtime room names (`service_{tenant}_{code}`).
    pub fn code(&self) -> &'static str {
        match self {
            Platform::WhatsApp => "wa",
            Platform::Messenger => "ms",
            Platform::Instagram => "ig",
            Platform::Telegram => "tg",
            Platform::WebChat => "wc",
        }
    }

    /// Platforms delivered through Meta's unified webhook.
    pub fn is_meta(&self) -> bool {
        matches!(
            self,
            Platform::WhatsApp | Platform::Messenger | Platform::Instagram
        )
    }
}

/// Lifecycle status of a client service binding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Trial,
    Active,
    Expired,
    Cancelled,
}

impl ServiceStatus {
    /// Whether webhooks for this service should advance the pipeline.
    pub fn accepts_traffic(&self) -> bool {
        matches!(self, ServiceStatus::Trial | ServiceStatus::Active)
    }
}

/// Who authored a message within a conversation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    /// The external end user.
    Contact,
    /// The AI auto-responder.
    Bot,
    /// A human operator.
    Human,
}

/// Content classification mapped from platform-specific type enums.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Audio,
    Video,
    Document,
    /// Anything the platform sent that we cannot represent. Stored with a
    /// textual placeholder so operators see it instead of a silent drop.
    Unsupported,
}

/// Delivery lifecycle of an outbound (or stored inbound) message.
///
/// Forward states are strictly ordered; `Failed` is a jump, not a rank.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl DeliveryStatus {
    /// Rank of a forward state, `None` for `Failed`.
    ///
    /// The delivery tracker only advances to a higher rank; see
    /// `chatrelay-storage` for the `Failed` jump rules.
    pub fn rank(&self) -> Option<u8> {
        match self {
            DeliveryStatus::Pending => Some(0),
            DeliveryStatus::Sent => Some(1),
            DeliveryStatus::Delivered => Some(2),
            DeliveryStatus::Read => Some(3),
            DeliveryStatus::Failed => None,
        }
    }
}

/// Status of a conversation thread. Conversations are never hard-deleted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Closed,
}

/// Scope of an exhausted rate window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RateScope {
    Tenant,
    Conversation,
}

/// A single inbound message after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub platform: Platform,
    /// Platform-scoped id of the external contact (wa_id, PSID, chat id...).
    pub contact_id: String,
    /// Platform-assigned message id, used for dedup and status correlation.
    pub external_id: String,
    pub content: String,
    pub kind: MessageKind,
    /// Display name of the contact when the platform provides one.
    pub contact_name: Option<String>,
    /// Platform timestamp, RFC 3339.
    pub timestamp: String,
}

/// A delivery/read acknowledgement extracted from a webhook payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub platform: Platform,
    pub external_id: String,
    pub status: DeliveryStatus,
    pub timestamp: Option<String>,
}

/// One discrete event unrolled from a webhook payload.
///
/// A single Meta webhook call may carry many of these across its nested
/// `entry`/`changes`/`messaging` arrays; Telegram carries exactly one.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    Message(InboundMessage),
    Status(StatusUpdate),
}

/// An outbound reply handed to a platform adapter for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundReply {
    /// Platform-scoped recipient id.
    pub contact_id: String,
    pub content: String,
}

/// Per-service platform credentials. Opaque to everything but the adapter
/// for the matching platform; which fields are populated depends on it.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceCredentials {
    /// Meta Graph API access token / generic API token.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Meta app secret, used for webhook HMAC verification.
    #[serde(default)]
    pub app_secret: Option<String>,
    /// Meta webhook verification-handshake token.
    #[serde(default)]
    pub verify_token: Option<String>,
    /// Messenger/Instagram page id.
    #[serde(default)]
    pub page_id: Option<String>,
    /// WhatsApp Cloud API phone-number id.
    #[serde(default)]
    pub phone_number_id: Option<String>,
    /// Telegram bot token (doubles as the webhook path secret).
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Optional Telegram `X-Telegram-Bot-Api-Secret-Token` value.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

impl std::fmt::Debug for ServiceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn redact(v: &Option<String>) -> &'static str {
            if v.is_some() { "[redacted]" } else { "none" }
        }
        f.debug_struct("ServiceCredentials")
            .field("access_token", &redact(&self.access_token))
            .field("app_secret", &redact(&self.app_secret))
            .field("verify_token", &redact(&self.verify_token))
            .field("page_id", &self.page_id)
            .field("phone_number_id", &self.phone_number_id)
            .field("bot_token", &redact(&self.bot_token))
            .field("webhook_secret", &redact(&self.webhook_secret))
            .finish()
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter in the registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Platform,
    Responder,
    Storage,
    Broadcast,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn platform_round_trips_through_strings() {
        for p in [
            Platform::WhatsApp,
            Platform::Messenger,
            Platform::Instagram,
            Platform::Telegram,
            Platform::WebChat,
        ] {
            let s = p.to_string();
            assert_eq!(Platform::from_str(&s).unwrap(), p);
        }
    }

    #[test]
    fn platform_codes_are_distinct() {
        let codes = [
            Platform::WhatsApp.code(),
            Platform::Messenger.code(),
            Platform::Instagram.code(),
            Platform::Telegram.code(),
            Platform::WebChat.code(),
        ];
        let mut unique: Vec<_> = codes.to_vec();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn meta_platforms() {
        assert!(Platform::WhatsApp.is_meta());
        assert!(Platform::Messenger.is_meta());
        assert!(Platform::Instagram.is_meta());
        assert!(!Platform::Telegram.is_meta());
        assert!(!Platform::WebChat.is_meta());
    }

    #[test]
    fn service_status_traffic_gate() {
        assert!(ServiceStatus::Trial.accepts_traffic());
        assert!(ServiceStatus::Active.accepts_traffic());
        assert!(!ServiceStatus::Expired.accepts_traffic());
        assert!(!ServiceStatus::Cancelled.accepts_traffic());
    }

    #[test]
    fn delivery_ranks_are_ordered() {
        assert!(DeliveryStatus::Pending.rank() < DeliveryStatus::Sent.rank());
        assert!(DeliveryStatus::Sent.rank() < DeliveryStatus::Delivered.rank());
        assert!(DeliveryStatus::Delivered.rank() < DeliveryStatus::Read.rank());
        assert_eq!(DeliveryStatus::Failed.rank(), None);
    }

    #[test]
    fn delivery_status_serializes_snake_case() {
        let json = serde_json::to_string(&DeliveryStatus::Delivered).unwrap();
        assert_eq!(json, "\"delivered\"");
        let parsed: DeliveryStatus = serde_json::from_str("\"read\"").unwrap();
        assert_eq!(parsed, DeliveryStatus::Read);
    }

    #[test]
    fn credentials_debug_redacts_secrets() {
        let creds = ServiceCredentials {
            access_token: Some("EAAB-super-secret".into()),
            app_secret: Some("shhh".into()),
            page_id: Some("page-1".into()),
            ..Default::default()
        };
        let debug = format!("{creds:?}");
        assert!(!debug.contains("EAAB-super-secret"));
        assert!(!debug.contains("shhh"));
        assert!(debug.contains("[redacted]"));
        assert!(debug.contains("page-1"));
    }

    #[test]
    fn inbound_message_serde_round_trip() {
        let msg = InboundMessage {
            platform: Platform::WhatsApp,
            contact_id: "5511999990000".into(),
            external_id: "wamid.ABGG".into(),
            content: "hola".into(),
            kind: MessageKind::Text,
            contact_name: Some("Ana".into()),
            timestamp: "2026-02-01T10:00:00Z".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: InboundMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
