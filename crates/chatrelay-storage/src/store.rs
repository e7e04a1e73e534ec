// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The conversation store: idempotent conversation resolution, rate-window
//! enforcement, and atomic message recording.
//!
//! `record_inbound` is the serialization point required by the pipeline's
//! ordering guarantee: a per-conversation async lock makes
//! upsert -> dedup -> limit-check -> insert one atomic step per key, and all
//! SQL runs on the single writer thread, so insert order equals arrival
//! order within a conversation.

use std::sync::Arc;

use chatrelay_core::ChatRelayError;
use chatrelay_core::types::{
    ConversationStatus, DeliveryStatus, InboundMessage, RateScope, SenderKind, ServiceCredentials,
    ServiceStatus,
};
use chatrelay_config::model::LimitsConfig;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::database::Database;
use crate::models::{ClientService, Conversation, StoredMessage, now_rfc3339};
use crate::queries::{conversations, messages, services};
use crate::queries::messages::StatusAdvance;
use crate::ratelimit::RateWindows;

/// Daily limits carried over from configuration.
#[derive(Debug, Clone, Copy)]
pub struct StoreLimits {
    pub tenant_daily_trial: u32,
    pub tenant_daily_paid: u32,
    pub conversation_daily: u32,
}

impl From<&LimitsConfig> for StoreLimits {
    fn from(config: &LimitsConfig) -> Self {
        Self {
            tenant_daily_trial: config.tenant_daily_trial,
            tenant_daily_paid: config.tenant_daily_paid,
            conversation_daily: config.conversation_daily,
        }
    }
}

/// Outcome of recording one inbound message.
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    /// Stored. `new_conversation` is true on first contact.
    Created {
        conversation: Conversation,
        message: StoredMessage,
        new_conversation: bool,
    },
    /// The external message id was already stored -- webhook redelivery.
    Duplicate { conversation: Conversation },
    /// A daily window is exhausted; nothing was stored. The dispatch
    /// router owns the notify-or-drop policy.
    RateLimited {
        scope: RateScope,
        conversation: Conversation,
    },
}

/// Store front combining the database, rate windows, and per-conversation
/// serialization.
pub struct ConversationStore {
    db: Database,
    limits: StoreLimits,
    windows: RateWindows,
    conversation_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ConversationStore {
    pub fn new(db: Database, limits: StoreLimits) -> Self {
        Self {
            db,
            limits,
            windows: RateWindows::new(),
            conversation_locks: DashMap::new(),
        }
    }

    /// Underlying database handle, for read-path queries.
    pub fn database(&self) -> &Database {
        &self.db
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.conversation_locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn tenant_limit(&self, status: ServiceStatus) -> u32 {
        match status {
            ServiceStatus::Trial => self.limits.tenant_daily_trial,
            _ => self.limits.tenant_daily_paid,
        }
    }

    /// Record one inbound contact message.
    ///
    /// Resolves the conversation idempotently, drops webhook redeliveries,
    /// enforces the tenant and conversation daily windows, and inserts the
    /// message with the unread counter advanced in the same transaction.
    pub async fn record_inbound(
        &self,
        service: &ClientService,
        inbound: &InboundMessage,
    ) -> Result<RecordOutcome, ChatRelayError> {
        let lock_key = format!(
            "{}:{}:{}",
            service.tenant_id, inbound.platform, inbound.contact_id
        );
        let lock = self.lock_for(&lock_key);
        let _guard = lock.lock().await;

        let (conversation, new_conversation) = conversations::upsert_conversation(
            &self.db,
            &service.tenant_id,
            &service.id,
            inbound.platform,
            &inbound.contact_id,
            inbound.contact_name.as_deref(),
        )
        .await?;

        // Dedup before consuming window slots: a replay must be free.
        if messages::external_id_exists(&self.db, &conversation.id, &inbound.external_id).await? {
            debug!(
                conversation_id = conversation.id.as_str(),
                external_id = inbound.external_id.as_str(),
                "duplicate webhook delivery dropped"
            );
            return Ok(RecordOutcome::Duplicate { conversation });
        }

        let today = chrono::Utc::now().date_naive();
        let tenant_key = format!("tenant:{}", service.tenant_id);
        let tenant_limit = self.tenant_limit(service.status);
        if !self.windows.try_acquire(&tenant_key, tenant_limit, today) {
            return Ok(RecordOutcome::RateLimited {
                scope: RateScope::Tenant,
                conversation,
            });
        }

        let conversation_key = format!("conversation:{}", conversation.id);
        if !self
            .windows
            .try_acquire(&conversation_key, self.limits.conversation_daily, today)
        {
            // Give back the tenant slot; this message stored nothing.
            self.windows.release(&tenant_key, today);
            return Ok(RecordOutcome::RateLimited {
                scope: RateScope::Conversation,
                conversation,
            });
        }

        let message = StoredMessage {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation.id.clone(),
            sender: SenderKind::Contact,
            content: inbound.content.clone(),
            kind: inbound.kind,
            delivery_status: DeliveryStatus::Delivered,
            external_id: Some(inbound.external_id.clone()),
            created_at: now_rfc3339(),
        };

        if !messages::insert_inbound(&self.db, &message).await? {
            // Unique index beat us to it despite the dedup probe.
            self.windows.release(&conversation_key, today);
            self.windows.release(&tenant_key, today);
            return Ok(RecordOutcome::Duplicate { conversation });
        }

        Ok(RecordOutcome::Created {
            conversation,
            message,
            new_conversation,
        })
    }

    /// Persist an outbound (bot or human) message in `pending` state.
    pub async fn record_outbound(
        &self,
        conversation_id: &str,
        sender: SenderKind,
        content: &str,
    ) -> Result<StoredMessage, ChatRelayError> {
        let message = StoredMessage {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            sender,
            content: content.to_string(),
            kind: chatrelay_core::types::MessageKind::Text,
            delivery_status: DeliveryStatus::Pending,
            external_id: None,
            created_at: now_rfc3339(),
        };
        messages::insert_message(&self.db, &message).await?;
        Ok(message)
    }

    // --- Conversation passthroughs ---

    /// Resolve (or create) the conversation for a contact without recording
    /// a message. Used by the WebChat join flow, where the widget opens the
    /// conversation before the first message is typed.
    pub async fn upsert_conversation(
        &self,
        service: &ClientService,
        contact_id: &str,
        contact_name: Option<&str>,
    ) -> Result<(Conversation, bool), ChatRelayError> {
        conversations::upsert_conversation(
            &self.db,
            &service.tenant_id,
            &service.id,
            service.platform,
            contact_id,
            contact_name,
        )
        .await
    }

    pub async fn conversation(&self, id: &str) -> Result<Option<Conversation>, ChatRelayError> {
        conversations::get_conversation(&self.db, id).await
    }

    pub async fn conversations_for_service(
        &self,
        service_id: &str,
        limit: i64,
    ) -> Result<Vec<Conversation>, ChatRelayError> {
        conversations::list_for_service(&self.db, service_id, limit).await
    }

    pub async fn set_bot_active(&self, id: &str, active: bool) -> Result<(), ChatRelayError> {
        conversations::set_bot_active(&self.db, id, active).await
    }

    pub async fn set_conversation_status(
        &self,
        id: &str,
        status: ConversationStatus,
    ) -> Result<(), ChatRelayError> {
        conversations::set_status(&self.db, id, status).await
    }

    pub async fn mark_read(&self, id: &str) -> Result<(), ChatRelayError> {
        conversations::mark_read(&self.db, id).await
    }

    // --- Message passthroughs ---

    pub async fn history(
        &self,
        conversation_id: &str,
        limit: i64,
    ) -> Result<Vec<StoredMessage>, ChatRelayError> {
        messages::recent_messages(&self.db, conversation_id, limit).await
    }

    pub async fn messages(
        &self,
        conversation_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<StoredMessage>, ChatRelayError> {
        messages::get_messages(&self.db, conversation_id, limit).await
    }

    pub async fn set_external_id(
        &self,
        message_id: &str,
        external_id: &str,
    ) -> Result<(), ChatRelayError> {
        messages::set_external_id(&self.db, message_id, external_id).await
    }

    pub async fn advance_status_by_external(
        &self,
        external_id: &str,
        status: DeliveryStatus,
    ) -> Result<StatusAdvance, ChatRelayError> {
        messages::advance_status_by_external(&self.db, external_id, status).await
    }

    pub async fn advance_status_by_id(
        &self,
        message_id: &str,
        status: DeliveryStatus,
    ) -> Result<StatusAdvance, ChatRelayError> {
        messages::advance_status_by_id(&self.db, message_id, status).await
    }

    // --- Service passthroughs (the credential-lookup collaborator) ---

    pub async fn service(&self, id: &str) -> Result<Option<ClientService>, ChatRelayError> {
        services::get_service(&self.db, id).await
    }

    pub async fn find_meta_service(
        &self,
        identifier: &str,
    ) -> Result<Option<ClientService>, ChatRelayError> {
        services::find_meta_service(&self.db, identifier).await
    }

    pub async fn find_meta_service_by_verify_token(
        &self,
        token: &str,
    ) -> Result<Option<ClientService>, ChatRelayError> {
        services::find_meta_service_by_verify_token(&self.db, token).await
    }

    pub async fn find_telegram_service(
        &self,
        bot_token: &str,
    ) -> Result<Option<ClientService>, ChatRelayError> {
        services::find_telegram_service(&self.db, bot_token).await
    }

    pub async fn set_needs_reauth(
        &self,
        service_id: &str,
        needs_reauth: bool,
    ) -> Result<(), ChatRelayError> {
        services::set_needs_reauth(&self.db, service_id, needs_reauth).await
    }

    pub async fn update_credentials(
        &self,
        service_id: &str,
        credentials: &ServiceCredentials,
    ) -> Result<(), ChatRelayError> {
        services::update_credentials(&self.db, service_id, credentials).await
    }
}
