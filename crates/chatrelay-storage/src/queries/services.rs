// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant and client-service lookups.
//!
//! The resolver queries here are the credential-lookup collaborator of the
//! webhook pipeline: platform identifier in, owning service out. Identifier
//! fields live inside the credentials JSON blob and are matched with
//! `json_extract`.

use chatrelay_core::ChatRelayError;
use chatrelay_core::types::{ServiceCredentials, ServiceStatus};
use rusqlite::params;

use crate::database::Database;
use crate::models::{ClientService, now_rfc3339, parse_enum};

const SERVICE_COLUMNS: &str =
    "id, tenant_id, platform, status, credentials, personality, needs_reauth, created_at, updated_at";

fn service_from_row(row: &rusqlite::Row) -> Result<ClientService, rusqlite::Error> {
    let credentials_json: String = row.get(4)?;
    let credentials: ServiceCredentials =
        serde_json::from_str(&credentials_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;
    Ok(ClientService {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        platform: parse_enum(2, row.get(2)?)?,
        status: parse_enum(3, row.get(3)?)?,
        credentials,
        personality: row.get(5)?,
        needs_reauth: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Insert a tenant row.
pub async fn insert_tenant(db: &Database, id: &str, name: &str) -> Result<(), ChatRelayError> {
    let id = id.to_string();
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tenants (id, name, created_at) VALUES (?1, ?2, ?3)",
                params![id, name, now_rfc3339()],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert a client service.
pub async fn insert_service(db: &Database, service: &ClientService) -> Result<(), ChatRelayError> {
    let service = service.clone();
    db.connection()
        .call(move |conn| {
            let credentials = serde_json::to_string(&service.credentials)
                .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
            conn.execute(
                "INSERT INTO client_services
                 (id, tenant_id, platform, status, credentials, personality, needs_reauth, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    service.id,
                    service.tenant_id,
                    service.platform.to_string(),
                    service.status.to_string(),
                    credentials,
                    service.personality,
                    service.needs_reauth,
                    service.created_at,
                    service.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a client service by id.
pub async fn get_service(db: &Database, id: &str) -> Result<Option<ClientService>, ChatRelayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SERVICE_COLUMNS} FROM client_services WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], service_from_row);
            match result {
                Ok(service) => Ok(Some(service)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find the Meta service owning a page id or WhatsApp phone-number id.
pub async fn find_meta_service(
    db: &Database,
    identifier: &str,
) -> Result<Option<ClientService>, ChatRelayError> {
    let identifier = identifier.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SERVICE_COLUMNS} FROM client_services
                 WHERE platform IN ('whatsapp', 'messenger', 'instagram')
                   AND (json_extract(credentials, '$.page_id') = ?1
                        OR json_extract(credentials, '$.phone_number_id') = ?1)"
            ))?;
            let result = stmt.query_row(params![identifier], service_from_row);
            match result {
                Ok(service) => Ok(Some(service)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find the Meta service configured with the given webhook verify token.
///
/// Used by the GET handshake, which carries no other identifier.
pub async fn find_meta_service_by_verify_token(
    db: &Database,
    token: &str,
) -> Result<Option<ClientService>, ChatRelayError> {
    let token = token.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SERVICE_COLUMNS} FROM client_services
                 WHERE platform IN ('whatsapp', 'messenger', 'instagram')
                   AND json_extract(credentials, '$.verify_token') = ?1"
            ))?;
            let result = stmt.query_row(params![token], service_from_row);
            match result {
                Ok(service) => Ok(Some(service)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find the Telegram service whose bot token appears in the webhook path.
pub async fn find_telegram_service(
    db: &Database,
    bot_token: &str,
) -> Result<Option<ClientService>, ChatRelayError> {
    let bot_token = bot_token.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SERVICE_COLUMNS} FROM client_services
                 WHERE platform = 'telegram'
                   AND json_extract(credentials, '$.bot_token') = ?1"
            ))?;
            let result = stmt.query_row(params![bot_token], service_from_row);
            match result {
                Ok(service) => Ok(Some(service)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Flag or clear the re-authentication marker on a service.
pub async fn set_needs_reauth(
    db: &Database,
    id: &str,
    needs_reauth: bool,
) -> Result<(), ChatRelayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE client_services SET needs_reauth = ?1, updated_at = ?2 WHERE id = ?3",
                params![needs_reauth, now_rfc3339(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Replace a service's credential blob (external re-auth flow).
pub async fn update_credentials(
    db: &Database,
    id: &str,
    credentials: &ServiceCredentials,
) -> Result<(), ChatRelayError> {
    let id = id.to_string();
    let credentials = credentials.clone();
    db.connection()
        .call(move |conn| {
            let json = serde_json::to_string(&credentials)
                .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
            conn.execute(
                "UPDATE client_services
                 SET credentials = ?1, needs_reauth = 0, updated_at = ?2 WHERE id = ?3",
                params![json, now_rfc3339(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Change a service's lifecycle status.
pub async fn set_service_status(
    db: &Database,
    id: &str,
    status: ServiceStatus,
) -> Result<(), ChatRelayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE client_services SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.to_string(), now_rfc3339(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
