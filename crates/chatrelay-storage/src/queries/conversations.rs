// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation CRUD and the idempotent per-contact upsert.

use chatrelay_core::ChatRelayError;
use chatrelay_core::types::{ConversationStatus, Platform};
use rusqlite::params;

use crate::database::Database;
use crate::models::{Conversation, now_rfc3339, parse_enum};

const CONVERSATION_COLUMNS: &str =
    "id, tenant_id, service_id, platform, contact_id, contact_name, status, is_bot_active, unread_count, created_at, updated_at";

fn conversation_from_row(row: &rusqlite::Row) -> Result<Conversation, rusqlite::Error> {
    Ok(Conversation {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        service_id: row.get(2)?,
        platform: parse_enum(3, row.get(3)?)?,
        contact_id: row.get(4)?,
        contact_name: row.get(5)?,
        status: parse_enum(6, row.get(6)?)?,
        is_bot_active: row.get(7)?,
        unread_count: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Resolve the conversation for (tenant, platform, contact), creating it on
/// first contact. Returns the row and whether it was freshly created.
///
/// Idempotent under webhook replay: the unique (tenant, platform, contact)
/// index plus the select-then-insert running on the single writer thread
/// guarantees at most one row per tuple. An inbound message on a soft-closed
/// conversation reopens it.
pub async fn upsert_conversation(
    db: &Database,
    tenant_id: &str,
    service_id: &str,
    platform: Platform,
    contact_id: &str,
    contact_name: Option<&str>,
) -> Result<(Conversation, bool), ChatRelayError> {
    let tenant_id = tenant_id.to_string();
    let service_id = service_id.to_string();
    let contact_id = contact_id.to_string();
    let contact_name = contact_name.map(str::to_string);
    let new_id = uuid::Uuid::new_v4().to_string();

    db.connection()
        .call(move |conn| {
            let existing = {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations
                     WHERE tenant_id = ?1 AND platform = ?2 AND contact_id = ?3"
                ))?;
                match stmt.query_row(
                    params![tenant_id, platform.to_string(), contact_id],
                    conversation_from_row,
                ) {
                    Ok(conversation) => Some(conversation),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e.into()),
                }
            };

            if let Some(conversation) = existing {
                let now = now_rfc3339();
                conn.execute(
                    "UPDATE conversations
                     SET status = 'active',
                         contact_name = COALESCE(?1, contact_name),
                         updated_at = ?2
                     WHERE id = ?3",
                    params![contact_name, now, conversation.id],
                )?;
                let mut stmt = conn.prepare(&format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"
                ))?;
                let refreshed = stmt.query_row(params![conversation.id], conversation_from_row)?;
                return Ok((refreshed, false));
            }

            let now = now_rfc3339();
            conn.execute(
                "INSERT INTO conversations
                 (id, tenant_id, service_id, platform, contact_id, contact_name,
                  status, is_bot_active, unread_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'active', 1, 0, ?7, ?7)",
                params![
                    new_id,
                    tenant_id,
                    service_id,
                    platform.to_string(),
                    contact_id,
                    contact_name,
                    now,
                ],
            )?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"
            ))?;
            let created = stmt.query_row(params![new_id], conversation_from_row)?;
            Ok((created, true))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a conversation by id.
pub async fn get_conversation(
    db: &Database,
    id: &str,
) -> Result<Option<Conversation>, ChatRelayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], conversation_from_row) {
                Ok(conversation) => Ok(Some(conversation)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List a service's conversations, most recently active first.
pub async fn list_for_service(
    db: &Database,
    service_id: &str,
    limit: i64,
) -> Result<Vec<Conversation>, ChatRelayError> {
    let service_id = service_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE service_id = ?1 ORDER BY updated_at DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![service_id, limit], conversation_from_row)?;
            let mut conversations = Vec::new();
            for row in rows {
                conversations.push(row?);
            }
            Ok(conversations)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Toggle the automated/human-handled flag. An explicit operator action,
/// never inferred by the router.
pub async fn set_bot_active(
    db: &Database,
    id: &str,
    is_bot_active: bool,
) -> Result<(), ChatRelayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET is_bot_active = ?1, updated_at = ?2 WHERE id = ?3",
                params![is_bot_active, now_rfc3339(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Soft-close or reopen a conversation.
pub async fn set_status(
    db: &Database,
    id: &str,
    status: ConversationStatus,
) -> Result<(), ChatRelayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.to_string(), now_rfc3339(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Reset the unread counter (operator opened the conversation).
pub async fn mark_read(db: &Database, id: &str) -> Result<(), ChatRelayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET unread_count = 0, updated_at = ?1 WHERE id = ?2",
                params![now_rfc3339(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
