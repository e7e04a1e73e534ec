// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Normalization of Telegram Bot API webhook updates.
//!
//! Telegram delivers exactly one `Update` per webhook call. Updates are
//! parsed into teloxide's typed schema; anything that is not a plain
//! message (edits, channel posts, callback queries) produces no events,
//! and message types we cannot represent become
//! `MessageKind::Unsupported` with a placeholder.

use chatrelay_core::ChatRelayError;
use chatrelay_core::types::{InboundMessage, MessageKind, Platform, WebhookEvent};
use teloxide::types::{Message, Update, UpdateKind};
use tracing::debug;

/// Placeholder stored for Telegram message types we cannot represent.
pub const UNSUPPORTED_PLACEHOLDER: &str = "[received an unsupported attachment]";

/// Unroll one Telegram webhook update into canonical events.
pub fn normalize(payload: &serde_json::Value) -> Result<Vec<WebhookEvent>, ChatRelayError> {
    let update: Update = serde_json::from_value(payload.clone()).map_err(|e| {
        ChatRelayError::Internal(format!("malformed Telegram update: {e}"))
    })?;

    match &update.kind {
        UpdateKind::Message(msg) => Ok(to_events(msg)),
        other => {
            debug!(kind = ?other, "ignoring non-message Telegram update");
            Ok(Vec::new())
        }
    }
}

fn to_events(msg: &Message) -> Vec<WebhookEvent> {
    let (content, kind) = extract_content(msg);

    let contact_name = msg.from.as_ref().map(|user| {
        user.username
            .clone()
            .unwrap_or_else(|| user.first_name.clone())
    });

    vec![WebhookEvent::Message(InboundMessage {
        platform: Platform::Telegram,
        // Chat id doubles as the send target; for DMs it equals the user id.
        contact_id: msg.chat.id.0.to_string(),
        external_id: msg.id.0.to_string(),
        content,
        kind,
        contact_name,
        timestamp: msg.date.to_rfc3339(),
    })]
}

/// Map a Telegram message onto (content, kind).
///
/// Captions ride along as the stored content for media messages.
fn extract_content(msg: &Message) -> (String, MessageKind) {
    if let Some(text) = msg.text() {
        return (text.to_string(), MessageKind::Text);
    }
    let caption = msg.caption().map(str::to_string);
    if msg.photo().is_some() {
        return (caption.unwrap_or_else(|| "[image]".into()), MessageKind::Image);
    }
    if msg.voice().is_some() || msg.audio().is_some() {
        return (caption.unwrap_or_else(|| "[audio]".into()), MessageKind::Audio);
    }
    if msg.video().is_some() {
        return (caption.unwrap_or_else(|| "[video]".into()), MessageKind::Video);
    }
    if let Some(doc) = msg.document() {
        let label = doc
            .file_name
            .as_ref()
            .map(|f| format!("[document: {f}]"))
            .unwrap_or_else(|| "[document]".into());
        return (caption.unwrap_or(label), MessageKind::Document);
    }
    (UNSUPPORTED_PLACEHOLDER.to_string(), MessageKind::Unsupported)
}
