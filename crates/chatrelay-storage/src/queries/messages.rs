// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message CRUD, webhook dedup, and monotonic delivery-status advancement.

use chatrelay_core::ChatRelayError;
use chatrelay_core::types::DeliveryStatus;
use rusqlite::params;

use crate::database::Database;
use crate::models::{StoredMessage, now_rfc3339, parse_enum};

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender, content, kind, delivery_status, external_id, created_at";

fn message_from_row(row: &rusqlite::Row) -> Result<StoredMessage, rusqlite::Error> {
    Ok(StoredMessage {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender: parse_enum(2, row.get(2)?)?,
        content: row.get(3)?,
        kind: parse_enum(4, row.get(4)?)?,
        delivery_status: parse_enum(5, row.get(5)?)?,
        external_id: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Outcome of a delivery-status advance attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusAdvance {
    /// No stored message carries this external id. Logged and discarded.
    Unmatched,
    /// The recorded status already outranks the event; nothing changed.
    Unchanged(StoredMessage),
    /// The status moved forward.
    Advanced(StoredMessage),
}

/// Monotonic advancement rule.
///
/// Forward states only move to a strictly higher rank. `Failed` is a jump
/// allowed from any forward state except `Read`; later `sent`/`delivered`/
/// `read` evidence advances past `Failed` (a retry succeeded, or the
/// platform delivered after we gave up).
pub(crate) fn should_advance(current: DeliveryStatus, new: DeliveryStatus) -> bool {
    match (current.rank(), new.rank()) {
        (Some(c), Some(n)) => n > c,
        (Some(_), None) => current != DeliveryStatus::Read,
        (None, Some(n)) => n >= 1,
        (None, None) => false,
    }
}

/// Insert a message and touch the conversation's `updated_at`.
pub async fn insert_message(db: &Database, msg: &StoredMessage) -> Result<(), ChatRelayError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO messages
                 (id, conversation_id, sender, content, kind, delivery_status, external_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    msg.id,
                    msg.conversation_id,
                    msg.sender.to_string(),
                    msg.content,
                    msg.kind.to_string(),
                    msg.delivery_status.to_string(),
                    msg.external_id,
                    msg.created_at,
                ],
            )?;
            tx.execute(
                "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                params![now_rfc3339(), msg.conversation_id],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert an inbound contact message with redelivery dedup.
///
/// Returns `false` (and writes nothing) when the (conversation, external id)
/// pair already exists. On insert, the conversation's unread counter and
/// `updated_at` advance in the same transaction.
pub async fn insert_inbound(db: &Database, msg: &StoredMessage) -> Result<bool, ChatRelayError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO messages
                 (id, conversation_id, sender, content, kind, delivery_status, external_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    msg.id,
                    msg.conversation_id,
                    msg.sender.to_string(),
                    msg.content,
                    msg.kind.to_string(),
                    msg.delivery_status.to_string(),
                    msg.external_id,
                    msg.created_at,
                ],
            )?;
            if inserted > 0 {
                tx.execute(
                    "UPDATE conversations
                     SET unread_count = unread_count + 1, updated_at = ?1
                     WHERE id = ?2",
                    params![now_rfc3339(), msg.conversation_id],
                )?;
            }
            tx.commit()?;
            Ok(inserted > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Whether a platform message id is already stored for the conversation.
pub async fn external_id_exists(
    db: &Database,
    conversation_id: &str,
    external_id: &str,
) -> Result<bool, ChatRelayError> {
    let conversation_id = conversation_id.to_string();
    let external_id = external_id.to_string();
    db.connection()
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1 AND external_id = ?2",
                params![conversation_id, external_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get messages for a conversation in arrival order.
pub async fn get_messages(
    db: &Database,
    conversation_id: &str,
    limit: Option<i64>,
) -> Result<Vec<StoredMessage>, ChatRelayError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut messages = Vec::new();
            match limit {
                Some(lim) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {MESSAGE_COLUMNS} FROM messages
                         WHERE conversation_id = ?1
                         ORDER BY created_at ASC, rowid ASC LIMIT ?2"
                    ))?;
                    let rows = stmt.query_map(params![conversation_id, lim], message_from_row)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {MESSAGE_COLUMNS} FROM messages
                         WHERE conversation_id = ?1
                         ORDER BY created_at ASC, rowid ASC"
                    ))?;
                    let rows = stmt.query_map(params![conversation_id], message_from_row)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The most recent `limit` messages of a conversation, oldest first.
///
/// This is the history window handed to the AI responder.
pub async fn recent_messages(
    db: &Database,
    conversation_id: &str,
    limit: i64,
) -> Result<Vec<StoredMessage>, ChatRelayError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![conversation_id, limit], message_from_row)?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            messages.reverse();
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record the platform-assigned id of a successfully sent message.
pub async fn set_external_id(
    db: &Database,
    message_id: &str,
    external_id: &str,
) -> Result<(), ChatRelayError> {
    let message_id = message_id.to_string();
    let external_id = external_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET external_id = ?1 WHERE id = ?2",
                params![external_id, message_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Advance the delivery status of the message carrying `external_id`.
///
/// Applies [`should_advance`]; out-of-order events settle on the highest
/// rank observed.
pub async fn advance_status_by_external(
    db: &Database,
    external_id: &str,
    new_status: DeliveryStatus,
) -> Result<StatusAdvance, ChatRelayError> {
    let external_id = external_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let found = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages WHERE external_id = ?1"
                ))?;
                match stmt.query_row(params![external_id], message_from_row) {
                    Ok(msg) => Some(msg),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e.into()),
                }
            };

            let Some(mut msg) = found else {
                return Ok(StatusAdvance::Unmatched);
            };

            if !should_advance(msg.delivery_status, new_status) {
                tx.commit()?;
                return Ok(StatusAdvance::Unchanged(msg));
            }

            tx.execute(
                "UPDATE messages SET delivery_status = ?1 WHERE id = ?2",
                params![new_status.to_string(), msg.id],
            )?;
            tx.commit()?;
            msg.delivery_status = new_status;
            Ok(StatusAdvance::Advanced(msg))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Advance the delivery status of a message by its internal id.
///
/// Used by the dispatch router after a send attempt; the same monotonic
/// rule applies, so a `delivered` webhook landing before our own `sent`
/// write cannot be regressed.
pub async fn advance_status_by_id(
    db: &Database,
    message_id: &str,
    new_status: DeliveryStatus,
) -> Result<StatusAdvance, ChatRelayError> {
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let found = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"
                ))?;
                match stmt.query_row(params![message_id], message_from_row) {
                    Ok(msg) => Some(msg),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e.into()),
                }
            };

            let Some(mut msg) = found else {
                return Ok(StatusAdvance::Unmatched);
            };

            if !should_advance(msg.delivery_status, new_status) {
                tx.commit()?;
                return Ok(StatusAdvance::Unchanged(msg));
            }

            tx.execute(
                "UPDATE messages SET delivery_status = ?1 WHERE id = ?2",
                params![new_status.to_string(), msg.id],
            )?;
            tx.commit()?;
            msg.delivery_status = new_status;
            Ok(StatusAdvance::Advanced(msg))
        })
        .await
        .map_err(crate::database::map_tr_err)
}
