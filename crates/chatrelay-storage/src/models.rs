// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for storage entities.
//!
//! Enum-valued columns are stored as their snake_case string form (the
//! `strum` Display output of the core enums) and parsed back on read.

use std::str::FromStr;

use chatrelay_core::types::{
    ConversationStatus, DeliveryStatus, MessageKind, Platform, SenderKind, ServiceCredentials,
    ServiceStatus,
};
use serde::{Deserialize, Serialize};

/// A tenant's binding to one messaging platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientService {
    pub id: String,
    pub tenant_id: String,
    pub platform: Platform,
    pub status: ServiceStatus,
    pub credentials: ServiceCredentials,
    /// AI personality / system instructions for this service's bot.
    pub personality: Option<String>,
    /// Set when an outbound send was rejected for authentication reasons;
    /// cleared by an external re-authentication flow.
    pub needs_reauth: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// One conversation thread between a tenant and an external contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub tenant_id: String,
    pub service_id: String,
    pub platform: Platform,
    pub contact_id: String,
    pub contact_name: Option<String>,
    pub status: ConversationStatus,
    pub is_bot_active: bool,
    pub unread_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// A stored message. Content is immutable after creation; only
/// `delivery_status` is mutated, by the delivery tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender: SenderKind,
    pub content: String,
    pub kind: MessageKind,
    pub delivery_status: DeliveryStatus,
    /// Platform-assigned id, present for inbound and successfully-sent
    /// outbound messages. Basis for dedup and status correlation.
    pub external_id: Option<String>,
    pub created_at: String,
}

/// Parse an enum column, mapping failures into a rusqlite conversion error
/// so they surface through the normal query error path.
pub(crate) fn parse_enum<T: FromStr>(
    column: usize,
    raw: String,
) -> Result<T, rusqlite::Error> {
    T::from_str(&raw).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            format!("unrecognized enum value: {raw}").into(),
        )
    })
}

/// Current timestamp in the RFC 3339 form used for every row.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
