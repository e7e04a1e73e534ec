// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Normalization of Meta's unified webhook payloads.
//!
//! One webhook call may batch many events: `entry[]` items each carry
//! `changes[].value.messages[]`/`statuses[]` (WhatsApp Cloud API) or
//! `messaging[]` (Messenger/Instagram). Everything is unrolled into flat
//! [`WebhookEvent`]s; unsupported attachment types become
//! `MessageKind::Unsupported` with a placeholder instead of being dropped.

use chatrelay_core::ChatRelayError;
use chatrelay_core::types::{
    DeliveryStatus, InboundMessage, MessageKind, Platform, StatusUpdate, WebhookEvent,
};
use serde::Deserialize;
use tracing::debug;

/// Placeholder stored for attachments we cannot represent.
pub const UNSUPPORTED_PLACEHOLDER: &str = "[received an unsupported attachment]";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    object: Option<String>,
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    changes: Vec<Change>,
    #[serde(default)]
    messaging: Vec<Messaging>,
}

#[derive(Debug, Deserialize)]
struct Change {
    #[serde(default)]
    value: Option<ChangeValue>,
}

// The `metadata.phone_number_id` identifier is read from the raw payload by
// [`platform_identifier`] before normalization, so it is not modeled here.
#[derive(Debug, Deserialize)]
struct ChangeValue {
    #[serde(default)]
    contacts: Vec<WaContact>,
    #[serde(default)]
    messages: Vec<WaMessage>,
    #[serde(default)]
    statuses: Vec<WaStatus>,
}

#[derive(Debug, Deserialize)]
struct WaContact {
    #[serde(default)]
    wa_id: Option<String>,
    #[serde(default)]
    profile: Option<WaProfile>,
}

#[derive(Debug, Deserialize)]
struct WaProfile {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaMessage {
    from: String,
    id: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<WaText>,
    #[serde(default)]
    image: Option<WaMedia>,
    #[serde(default)]
    audio: Option<WaMedia>,
    #[serde(default)]
    video: Option<WaMedia>,
    #[serde(default)]
    document: Option<WaMedia>,
}

#[derive(Debug, Deserialize)]
struct WaText {
    body: String,
}

#[derive(Debug, Deserialize)]
struct WaMedia {
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaStatus {
    id: String,
    status: String,
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Messaging {
    #[serde(default)]
    sender: Option<PartyRef>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    message: Option<MsMessage>,
    #[serde(default)]
    delivery: Option<MsDelivery>,
}

#[derive(Debug, Deserialize)]
struct PartyRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MsMessage {
    mid: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    attachments: Vec<MsAttachment>,
    #[serde(default)]
    is_echo: bool,
}

#[derive(Debug, Deserialize)]
struct MsAttachment {
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MsDelivery {
    #[serde(default)]
    mids: Vec<String>,
}

/// The platform Meta's `object` field claims this payload belongs to.
pub fn object_platform(payload: &serde_json::Value) -> Option<Platform> {
    match payload.get("object").and_then(|v| v.as_str())? {
        "whatsapp_business_account" => Some(Platform::WhatsApp),
        "page" => Some(Platform::Messenger),
        "instagram" => Some(Platform::Instagram),
        _ => None,
    }
}

/// Extract the tenant-resolution identifier from a payload: the WhatsApp
/// phone-number id, or the Messenger/Instagram page id.
///
/// Needed before signature verification, because the HMAC secret is the
/// resolved service's app secret.
pub fn platform_identifier(payload: &serde_json::Value) -> Option<String> {
    let entry = payload.get("entry")?.as_array()?.first()?;
    // WhatsApp: entry[].changes[].value.metadata.phone_number_id
    if let Some(phone_id) = entry
        .get("changes")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("value"))
        .and_then(|v| v.get("metadata"))
        .and_then(|m| m.get("phone_number_id"))
        .and_then(|p| p.as_str())
    {
        return Some(phone_id.to_string());
    }
    // Messenger/Instagram: entry[].id is the page id.
    entry.get("id").and_then(|i| i.as_str()).map(str::to_string)
}

/// Unroll a Meta webhook payload into canonical events.
pub fn normalize(
    platform: Platform,
    payload: &serde_json::Value,
) -> Result<Vec<WebhookEvent>, ChatRelayError> {
    let envelope: Envelope = serde_json::from_value(payload.clone()).map_err(|e| {
        ChatRelayError::Internal(format!("malformed Meta webhook payload: {e}"))
    })?;

    let mut events = Vec::new();
    for entry in &envelope.entry {
        for change in &entry.changes {
            if let Some(value) = &change.value {
                unroll_whatsapp_value(value, &mut events);
            }
        }
        for messaging in &entry.messaging {
            unroll_messaging(platform, messaging, &mut events);
        }
    }

    if events.is_empty() {
        debug!(
            object = envelope.object.as_deref().unwrap_or("<missing>"),
            "Meta webhook carried no message or status events"
        );
    }
    Ok(events)
}

fn unroll_whatsapp_value(value: &ChangeValue, events: &mut Vec<WebhookEvent>) {
    for msg in &value.messages {
        let contact_name = value
            .contacts
            .iter()
            .find(|c| c.wa_id.as_deref() == Some(msg.from.as_str()))
            .and_then(|c| c.profile.as_ref())
            .and_then(|p| p.name.clone());

        let (content, kind) = whatsapp_content(msg);
        events.push(WebhookEvent::Message(InboundMessage {
            platform: Platform::WhatsApp,
            contact_id: msg.from.clone(),
            external_id: msg.id.clone(),
            content,
            kind,
            contact_name,
            timestamp: epoch_seconds_to_rfc3339(msg.timestamp.as_deref()),
        }));
    }

    for status in &value.statuses {
        let Some(mapped) = map_status(&status.status) else {
            debug!(status = status.status.as_str(), "unrecognized WhatsApp status");
            continue;
        };
        events.push(WebhookEvent::Status(StatusUpdate {
            platform: Platform::WhatsApp,
            external_id: status.id.clone(),
            status: mapped,
            timestamp: status
                .timestamp
                .as_deref()
                .map(|t| epoch_seconds_to_rfc3339(Some(t))),
        }));
    }
}

fn unroll_messaging(platform: Platform, messaging: &Messaging, events: &mut Vec<WebhookEvent>) {
    let Some(sender) = &messaging.sender else {
        return;
    };

    if let Some(message) = &messaging.message {
        // Echoes of our own page sends come back through the same webhook.
        if message.is_echo {
            return;
        }
        let (content, kind) = messenger_content(message);
        events.push(WebhookEvent::Message(InboundMessage {
            platform,
            contact_id: sender.id.clone(),
            external_id: message.mid.clone(),
            content,
            kind,
            contact_name: None,
            timestamp: epoch_millis_to_rfc3339(messaging.timestamp),
        }));
    }

    if let Some(delivery) = &messaging.delivery {
        for mid in &delivery.mids {
            events.push(WebhookEvent::Status(StatusUpdate {
                platform,
                external_id: mid.clone(),
                status: DeliveryStatus::Delivered,
                timestamp: messaging.timestamp.map(|t| epoch_millis_to_rfc3339(Some(t))),
            }));
        }
    }
}

fn whatsapp_content(msg: &WaMessage) -> (String, MessageKind) {
    match msg.kind.as_deref() {
        Some("text") => {
            let body = msg.text.as_ref().map(|t| t.body.clone()).unwrap_or_default();
            (body, MessageKind::Text)
        }
        Some("image") => (media_caption(&msg.image, "[image]"), MessageKind::Image),
        Some("audio") => (media_caption(&msg.audio, "[audio]"), MessageKind::Audio),
        Some("video") => (media_caption(&msg.video, "[video]"), MessageKind::Video),
        Some("document") => {
            let label = msg
                .document
                .as_ref()
                .and_then(|d| d.filename.clone())
                .map(|f| format!("[document: {f}]"))
                .unwrap_or_else(|| "[document]".to_string());
            (media_caption(&msg.document, &label), MessageKind::Document)
        }
        _ => (UNSUPPORTED_PLACEHOLDER.to_string(), MessageKind::Unsupported),
    }
}

fn media_caption(media: &Option<WaMedia>, fallback: &str) -> String {
    media
        .as_ref()
        .and_then(|m| m.caption.clone())
        .unwrap_or_else(|| fallback.to_string())
}

fn messenger_content(message: &MsMessage) -> (String, MessageKind) {
    if let Some(text) = &message.text {
        return (text.clone(), MessageKind::Text);
    }
    match message.attachments.first().and_then(|a| a.kind.as_deref()) {
        Some("image") => ("[image]".to_string(), MessageKind::Image),
        Some("audio") => ("[audio]".to_string(), MessageKind::Audio),
        Some("video") => ("[video]".to_string(), MessageKind::Video),
        Some("file") => ("[document]".to_string(), MessageKind::Document),
        _ => (UNSUPPORTED_PLACEHOLDER.to_string(), MessageKind::Unsupported),
    }
}

fn map_status(raw: &str) -> Option<DeliveryStatus> {
    match raw {
        "sent" => Some(DeliveryStatus::Sent),
        "delivered" => Some(DeliveryStatus::Delivered),
        "read" => Some(DeliveryStatus::Read),
        "failed" => Some(DeliveryStatus::Failed),
        _ => None,
    }
}

fn epoch_seconds_to_rfc3339(raw: Option<&str>) -> String {
    raw.and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339())
}

fn epoch_millis_to_rfc3339(raw: Option<i64>) -> String {
    raw.and_then(chrono::DateTime::from_timestamp_millis)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339())
}
