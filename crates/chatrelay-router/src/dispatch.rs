// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dispatch router: decides per inbound message whether the AI
//! responder answers, a human operator takes over, or nothing happens.
//!
//! Per-conversation state machine: `is_bot_active = true` routes inbound
//! messages to the responder and sends its reply back out through the
//! platform adapter; `false` queues for a human operator with no automatic
//! reply. The flag is toggled only by explicit operator action and is
//! re-read after the AI call returns, so a mid-flight toggle suppresses an
//! already-computed reply.

use std::sync::Arc;

use chatrelay_config::model::ChatRelayConfig;
use chatrelay_core::ChatRelayError;
use chatrelay_core::error::SendFailureKind;
use chatrelay_core::traits::broadcast::{conversation_room, service_room, ADMIN_ROOM};
use chatrelay_core::traits::responder::{ChatTurn, CompletionRequest};
use chatrelay_core::traits::{Broadcaster, ResponderAdapter};
use chatrelay_core::types::{
    DeliveryStatus, InboundMessage, OutboundReply, RateScope, SenderKind,
};
use chatrelay_storage::{ClientService, Conversation, ConversationStore, RecordOutcome, StoredMessage};
use tracing::{debug, error, info, warn};

use crate::outbound;
use crate::registry::AdapterRegistry;

/// Policy knobs owned by the dispatch router.
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    /// Send the end user a notice when a rate window rejects their message.
    pub notify_on_limit: bool,
    /// Notice text for `notify_on_limit`.
    pub limit_notice: String,
    /// Reply sent when the AI responder fails.
    pub fallback_message: String,
    /// Conversation turns supplied to the responder.
    pub history_limit: i64,
}

impl DispatchPolicy {
    pub fn from_config(config: &ChatRelayConfig) -> Self {
        Self {
            notify_on_limit: config.limits.notify_on_limit,
            limit_notice: config.limits.limit_notice.clone(),
            fallback_message: config.responder.fallback_message.clone(),
            history_limit: i64::from(config.responder.history_limit),
        }
    }
}

/// What the router decided for one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    /// The AI responder was (or will be) invoked.
    pub to_bot: bool,
    /// The message sits in the human operator queue.
    pub to_human: bool,
    /// Nothing was stored or answered (duplicate, rate limit, or a
    /// mid-flight bot toggle swallowed the reply).
    pub suppressed: bool,
}

pub struct DispatchRouter {
    store: Arc<ConversationStore>,
    registry: Arc<AdapterRegistry>,
    responder: Option<Arc<dyn ResponderAdapter>>,
    bus: Arc<dyn Broadcaster>,
    policy: DispatchPolicy,
}

impl DispatchRouter {
    pub fn new(
        store: Arc<ConversationStore>,
        registry: Arc<AdapterRegistry>,
        responder: Option<Arc<dyn ResponderAdapter>>,
        bus: Arc<dyn Broadcaster>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            store,
            registry,
            responder,
            bus,
            policy,
        }
    }

    /// Route one normalized inbound message end to end.
    pub async fn handle_inbound(
        &self,
        service: &ClientService,
        inbound: &InboundMessage,
    ) -> Result<DispatchOutcome, ChatRelayError> {
        let outcome = self.store.record_inbound(service, inbound).await?;

        let (conversation, message, new_conversation) = match outcome {
            RecordOutcome::Duplicate { conversation } => {
                debug!(
                    conversation_id = conversation.id.as_str(),
                    "duplicate inbound suppressed"
                );
                return Ok(DispatchOutcome {
                    suppressed: true,
                    ..Default::default()
                });
            }
            RecordOutcome::RateLimited {
                scope,
                conversation,
            } => {
                self.handle_rate_limited(service, &conversation, inbound, scope)
                    .await;
                return Ok(DispatchOutcome {
                    suppressed: true,
                    ..Default::default()
                });
            }
            RecordOutcome::Created {
                conversation,
                message,
                new_conversation,
            } => (conversation, message, new_conversation),
        };

        if new_conversation {
            self.bus.publish(
                &service_room(&service.tenant_id, service.platform),
                "new_conversation",
                serde_json::json!({
                    "conversation": conversation,
                }),
            );
        }
        self.publish_message(service, &conversation.id, "new_message", &message);

        if conversation.is_bot_active && self.responder.is_some() {
            self.respond_with_bot(service, &conversation, inbound).await
        } else {
            debug!(
                conversation_id = conversation.id.as_str(),
                bot_active = conversation.is_bot_active,
                "queued for human operator"
            );
            Ok(DispatchOutcome {
                to_human: true,
                ..Default::default()
            })
        }
    }

    /// Persist and deliver a message authored by an operator or automation.
    pub async fn handle_operator_message(
        &self,
        service: &ClientService,
        conversation_id: &str,
        sender: SenderKind,
        content: &str,
    ) -> Result<StoredMessage, ChatRelayError> {
        let conversation = self
            .store
            .conversation(conversation_id)
            .await?
            .ok_or_else(|| {
                ChatRelayError::Internal(format!("conversation {conversation_id} not found"))
            })?;

        let message = self
            .store
            .record_outbound(&conversation.id, sender, content)
            .await?;
        self.publish_message(service, &conversation.id, "new_message", &message);
        self.deliver(service, &conversation, &message).await?;
        Ok(message)
    }

    async fn handle_rate_limited(
        &self,
        service: &ClientService,
        conversation: &Conversation,
        inbound: &InboundMessage,
        scope: RateScope,
    ) {
        warn!(
            tenant_id = service.tenant_id.as_str(),
            conversation_id = conversation.id.as_str(),
            scope = %scope,
            "inbound message rejected by rate window"
        );

        if !self.policy.notify_on_limit {
            return;
        }

        // The notice is ephemeral: delivered to the contact but not stored,
        // so the rejected message leaves no rows behind.
        let Ok(adapter) = self.registry.get(service.platform) else {
            return;
        };
        let reply = OutboundReply {
            contact_id: inbound.contact_id.clone(),
            content: self.policy.limit_notice.clone(),
        };
        if let Err(e) = adapter.send(&service.credentials, &reply).await {
            warn!(error = %e, "failed to deliver rate-limit notice");
        }
    }

    async fn respond_with_bot(
        &self,
        service: &ClientService,
        conversation: &Conversation,
        inbound: &InboundMessage,
    ) -> Result<DispatchOutcome, ChatRelayError> {
        let responder = self
            .responder
            .as_ref()
            .expect("respond_with_bot is gated on responder presence");

        // Ephemeral typing signal while the completion runs.
        self.bus.publish(
            &conversation_room(&conversation.id),
            "typing",
            serde_json::json!({"source": "bot"}),
        );
        if let Ok(adapter) = self.registry.get(service.platform)
            && let Err(e) = adapter
                .send_typing(&service.credentials, &inbound.contact_id)
                .await
        {
            debug!(error = %e, "failed to send typing indicator");
        }

        let request = self.build_completion(service, &conversation.id).await?;
        let reply_text = match responder.complete(request).await {
            Ok(text) => text,
            Err(e) => {
                error!(
                    conversation_id = conversation.id.as_str(),
                    error = %e,
                    "AI responder failed, using fallback reply"
                );
                self.policy.fallback_message.clone()
            }
        };

        // Re-read the flag: an operator may have taken over while the
        // completion was in flight. Their takeover wins.
        let current = self
            .store
            .conversation(&conversation.id)
            .await?
            .ok_or_else(|| {
                ChatRelayError::Internal(format!("conversation {} vanished", conversation.id))
            })?;
        if !current.is_bot_active {
            info!(
                conversation_id = conversation.id.as_str(),
                "bot reply suppressed by mid-flight operator takeover"
            );
            return Ok(DispatchOutcome {
                to_human: true,
                suppressed: true,
                ..Default::default()
            });
        }

        let message = self
            .store
            .record_outbound(&conversation.id, SenderKind::Bot, &reply_text)
            .await?;
        self.publish_message(service, &conversation.id, "bot_response", &message);
        self.deliver(service, &current, &message).await?;

        Ok(DispatchOutcome {
            to_bot: true,
            ..Default::default()
        })
    }

    async fn build_completion(
        &self,
        service: &ClientService,
        conversation_id: &str,
    ) -> Result<CompletionRequest, ChatRelayError> {
        let history = self
            .store
            .history(conversation_id, self.policy.history_limit)
            .await?;
        let messages = history
            .iter()
            .map(|msg| ChatTurn {
                role: match msg.sender {
                    SenderKind::Contact => "user".to_string(),
                    SenderKind::Bot | SenderKind::Human => "assistant".to_string(),
                },
                content: msg.content.clone(),
            })
            .collect();
        Ok(CompletionRequest {
            system: service.personality.clone(),
            messages,
        })
    }

    /// Deliver a persisted outbound message through the platform adapter,
    /// advancing its delivery status per the send outcome.
    async fn deliver(
        &self,
        service: &ClientService,
        conversation: &Conversation,
        message: &StoredMessage,
    ) -> Result<(), ChatRelayError> {
        let adapter = self.registry.get(service.platform)?;
        let reply = OutboundReply {
            contact_id: conversation.contact_id.clone(),
            content: message.content.clone(),
        };

        match outbound::send_with_retry(adapter.as_ref(), &service.credentials, &reply).await {
            Ok(external_id) => {
                self.store.set_external_id(&message.id, &external_id.0).await?;
                self.store
                    .advance_status_by_id(&message.id, DeliveryStatus::Sent)
                    .await?;
                Ok(())
            }
            Err(err) => {
                self.store
                    .advance_status_by_id(&message.id, DeliveryStatus::Failed)
                    .await?;
                match err.send_kind() {
                    Some(SendFailureKind::Auth) => {
                        error!(
                            service_id = service.id.as_str(),
                            error = %err,
                            "platform rejected credentials, flagging for re-authentication"
                        );
                        self.store.set_needs_reauth(&service.id, true).await?;
                        self.publish_alert(service, "credential_expired", &err);
                    }
                    Some(SendFailureKind::Permanent) => {
                        error!(
                            service_id = service.id.as_str(),
                            error = %err,
                            "permanent send failure"
                        );
                        self.publish_alert(service, "send_failed", &err);
                    }
                    _ => {
                        warn!(
                            service_id = service.id.as_str(),
                            error = %err,
                            "send failed after retries"
                        );
                    }
                }
                Err(err)
            }
        }
    }

    fn publish_message(
        &self,
        service: &ClientService,
        conversation_id: &str,
        event: &str,
        message: &StoredMessage,
    ) {
        let payload = serde_json::json!({"message": message});
        self.bus.publish(
            &service_room(&service.tenant_id, service.platform),
            event,
            payload.clone(),
        );
        self.bus
            .publish(&conversation_room(conversation_id), event, payload);
    }

    fn publish_alert(&self, service: &ClientService, kind: &str, err: &ChatRelayError) {
        let payload = serde_json::json!({
            "service_id": service.id,
            "kind": kind,
            "detail": err.to_string(),
        });
        self.bus.publish(
            &service_room(&service.tenant_id, service.platform),
            "operator_alert",
            payload.clone(),
        );
        self.bus.publish(ADMIN_ROOM, "operator_alert", payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chatrelay_core::traits::{PlatformAdapter, PluginAdapter};
    use chatrelay_core::types::{
        AdapterType, HealthStatus, MessageId, MessageKind, Platform, ServiceCredentials,
        ServiceStatus, WebhookEvent,
    };
    use chatrelay_storage::{Database, StoreLimits, queries};
    use std::sync::Mutex;
    use tempfile::tempdir;

    // --- test doubles -----------------------------------------------------

    /// Captures sends; every send succeeds with a fresh external id.
    struct CapturingPlatform {
        platform: Platform,
        sent: Mutex<Vec<OutboundReply>>,
        fail_with: Mutex<Option<SendFailureKind>>,
    }

    impl CapturingPlatform {
        fn new(platform: Platform) -> Self {
            Self {
                platform,
                sent: Mutex::new(Vec::new()),
                fail_with: Mutex::new(None),
            }
        }

        fn sent(&self) -> Vec<OutboundReply> {
            self.sent.lock().unwrap().clone()
        }

        fn fail_next_with(&self, kind: SendFailureKind) {
            *self.fail_with.lock().unwrap() = Some(kind);
        }
    }

    #[async_trait]
    impl PluginAdapter for CapturingPlatform {
        fn name(&self) -> &str {
            "capturing"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 1, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Platform
        }
        async fn health_check(&self) -> Result<HealthStatus, ChatRelayError> {
            Ok(HealthStatus::Healthy)
        }
        async fn shutdown(&self) -> Result<(), ChatRelayError> {
            Ok(())
        }
    }

    #[async_trait]
    impl PlatformAdapter for CapturingPlatform {
        fn platform(&self) -> Platform {
            self.platform
        }
        fn verify(&self, _raw: &[u8], _sig: Option<&str>, _secret: &str) -> bool {
            true
        }
        fn normalize(
            &self,
            _payload: &serde_json::Value,
        ) -> Result<Vec<WebhookEvent>, ChatRelayError> {
            Ok(Vec::new())
        }
        async fn send(
            &self,
            _creds: &ServiceCredentials,
            reply: &OutboundReply,
        ) -> Result<MessageId, ChatRelayError> {
            if let Some(kind) = self.fail_with.lock().unwrap().take() {
                return Err(ChatRelayError::Send {
                    kind,
                    message: "scripted failure".into(),
                    source: None,
                });
            }
            self.sent.lock().unwrap().push(reply.clone());
            Ok(MessageId(format!("ext-{}", uuid::Uuid::new_v4())))
        }
    }

    /// Responder returning queued texts, optionally toggling the bot flag
    /// mid-completion to simulate an operator takeover.
    struct ScriptedResponder {
        responses: Mutex<Vec<Result<String, ()>>>,
        toggle_off: Mutex<Option<(Arc<ConversationStore>, String)>>,
    }

    impl ScriptedResponder {
        fn new(responses: Vec<Result<String, ()>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                toggle_off: Mutex::new(None),
            }
        }

        fn toggle_bot_off_during_next_call(
            &self,
            store: Arc<ConversationStore>,
            conversation_id: String,
        ) {
            *self.toggle_off.lock().unwrap() = Some((store, conversation_id));
        }
    }

    #[async_trait]
    impl PluginAdapter for ScriptedResponder {
        fn name(&self) -> &str {
            "scripted-responder"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 1, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Responder
        }
        async fn health_check(&self) -> Result<HealthStatus, ChatRelayError> {
            Ok(HealthStatus::Healthy)
        }
        async fn shutdown(&self) -> Result<(), ChatRelayError> {
            Ok(())
        }
    }

    #[async_trait]
    impl ResponderAdapter for ScriptedResponder {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, ChatRelayError> {
            let toggle = self.toggle_off.lock().unwrap().take();
            if let Some((store, conversation_id)) = toggle {
                store.set_bot_active(&conversation_id, false).await.unwrap();
            }
            let next = {
                let mut responses = self.responses.lock().unwrap();
                if responses.is_empty() { None } else { Some(responses.remove(0)) }
            };
            match next {
                Some(Ok(text)) => Ok(text),
                Some(Err(())) => Err(ChatRelayError::Provider {
                    message: "scripted provider failure".into(),
                    source: None,
                }),
                None => Ok("default completion".into()),
            }
        }
    }

    /// Broadcaster that records every publish.
    #[derive(Default)]
    struct RecordingBus {
        events: Mutex<Vec<(String, String)>>,
    }

    impl RecordingBus {
        fn events(&self) -> Vec<(String, String)> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Broadcaster for RecordingBus {
        fn publish(&self, room: &str, event: &str, _payload: serde_json::Value) {
            self.events
                .lock()
                .unwrap()
                .push((room.to_string(), event.to_string()));
        }
    }

    // --- fixture ----------------------------------------------------------

    struct Fixture {
        store: Arc<ConversationStore>,
        router: DispatchRouter,
        platform: Arc<CapturingPlatform>,
        responder: Arc<ScriptedResponder>,
        bus: Arc<RecordingBus>,
        service: ClientService,
        _dir: tempfile::TempDir,
    }

    async fn fixture_with(responses: Vec<Result<String, ()>>, limits: StoreLimits) -> Fixture {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dispatch.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        queries::services::insert_tenant(&db, "tenant-1", "Acme Stores")
            .await
            .unwrap();
        let store = Arc::new(ConversationStore::new(db, limits));

        let now = chrono::Utc::now().to_rfc3339();
        let service = ClientService {
            id: "svc-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            platform: Platform::WhatsApp,
            status: ServiceStatus::Active,
            credentials: ServiceCredentials {
                access_token: Some("token".into()),
                phone_number_id: Some("phone-1".into()),
                ..Default::default()
            },
            personality: Some("Friendly assistant".into()),
            needs_reauth: false,
            created_at: now.clone(),
            updated_at: now,
        };
        queries::services::insert_service(store.database(), &service)
            .await
            .unwrap();

        let platform = Arc::new(CapturingPlatform::new(Platform::WhatsApp));
        let mut registry = AdapterRegistry::new();
        registry.register(platform.clone());

        let responder = Arc::new(ScriptedResponder::new(responses));
        let bus = Arc::new(RecordingBus::default());

        let router = DispatchRouter::new(
            store.clone(),
            Arc::new(registry),
            Some(responder.clone()),
            bus.clone(),
            DispatchPolicy {
                notify_on_limit: true,
                limit_notice: "daily limit reached".into(),
                fallback_message: "sorry, try again later".into(),
                history_limit: 20,
            },
        );

        Fixture {
            store,
            router,
            platform,
            responder,
            bus,
            service,
            _dir: dir,
        }
    }

    fn inbound(external_id: &str, content: &str) -> InboundMessage {
        InboundMessage {
            platform: Platform::WhatsApp,
            contact_id: "5511999990000".into(),
            external_id: external_id.into(),
            content: content.into(),
            kind: MessageKind::Text,
            contact_name: Some("Ana".into()),
            timestamp: "2026-02-01T10:00:00Z".into(),
        }
    }

    fn default_limits() -> StoreLimits {
        StoreLimits {
            tenant_daily_trial: 100,
            tenant_daily_paid: 2000,
            conversation_daily: 50,
        }
    }

    // --- tests ------------------------------------------------------------

    #[tokio::test]
    async fn bot_active_path_persists_and_sends_reply() {
        let f = fixture_with(vec![Ok("the answer".into())], default_limits()).await;

        let outcome = f
            .router
            .handle_inbound(&f.service, &inbound("wamid.1", "question?"))
            .await
            .unwrap();
        assert!(outcome.to_bot);
        assert!(!outcome.suppressed);

        let sent = f.platform.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].content, "the answer");
        assert_eq!(sent[0].contact_id, "5511999990000");

        // Both the contact message and the bot reply are stored; the reply
        // advanced to `sent` and carries the platform id.
        let conversations = f
            .store
            .conversations_for_service("svc-1", 10)
            .await
            .unwrap();
        let messages = f.store.messages(&conversations[0].id, None).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].sender, SenderKind::Bot);
        assert_eq!(messages[1].delivery_status, DeliveryStatus::Sent);
        assert!(messages[1].external_id.is_some());

        let events = f.bus.events();
        assert!(events.iter().any(|(_, e)| e == "new_conversation"));
        assert!(events.iter().any(|(_, e)| e == "new_message"));
        assert!(events.iter().any(|(_, e)| e == "bot_response"));
        assert!(events.iter().any(|(_, e)| e == "typing"));
    }

    #[tokio::test]
    async fn bot_inactive_path_queues_for_human() {
        let f = fixture_with(vec![Ok("should not be used".into())], default_limits()).await;

        // First message creates the conversation; then the operator takes over.
        f.router
            .handle_inbound(&f.service, &inbound("wamid.1", "hi"))
            .await
            .unwrap();
        let conversations = f
            .store
            .conversations_for_service("svc-1", 10)
            .await
            .unwrap();
        f.store.set_bot_active(&conversations[0].id, false).await.unwrap();
        let sends_before = f.platform.sent().len();

        let outcome = f
            .router
            .handle_inbound(&f.service, &inbound("wamid.2", "anyone there?"))
            .await
            .unwrap();
        assert!(outcome.to_human);
        assert!(!outcome.to_bot);
        assert_eq!(f.platform.sent().len(), sends_before);
    }

    #[tokio::test]
    async fn duplicate_is_suppressed_without_reply() {
        let f = fixture_with(vec![Ok("one".into()), Ok("two".into())], default_limits()).await;
        let msg = inbound("wamid.1", "hello");

        f.router.handle_inbound(&f.service, &msg).await.unwrap();
        let outcome = f.router.handle_inbound(&f.service, &msg).await.unwrap();

        assert!(outcome.suppressed);
        assert_eq!(f.platform.sent().len(), 1);
    }

    #[tokio::test]
    async fn rate_limited_sends_notice_but_stores_nothing() {
        let mut limits = default_limits();
        limits.tenant_daily_paid = 1;
        let f = fixture_with(vec![Ok("reply".into())], limits).await;

        f.router
            .handle_inbound(&f.service, &inbound("wamid.1", "first"))
            .await
            .unwrap();
        let outcome = f
            .router
            .handle_inbound(&f.service, &inbound("wamid.2", "second"))
            .await
            .unwrap();
        assert!(outcome.suppressed);

        // The second send is the limit notice, not a bot reply.
        let sent = f.platform.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].content, "daily limit reached");

        let conversations = f
            .store
            .conversations_for_service("svc-1", 10)
            .await
            .unwrap();
        let messages = f.store.messages(&conversations[0].id, None).await.unwrap();
        // Contact message + bot reply from the first inbound only.
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn ai_failure_falls_back_to_configured_message() {
        let f = fixture_with(vec![Err(())], default_limits()).await;

        let outcome = f
            .router
            .handle_inbound(&f.service, &inbound("wamid.1", "question"))
            .await
            .unwrap();
        assert!(outcome.to_bot);

        let sent = f.platform.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].content, "sorry, try again later");
    }

    #[tokio::test]
    async fn mid_flight_toggle_suppresses_the_reply() {
        let f = fixture_with(vec![Ok("too late".into())], default_limits()).await;

        // Seed the conversation so we know its id.
        f.router
            .handle_inbound(&f.service, &inbound("wamid.1", "hi"))
            .await
            .unwrap();
        let conversations = f
            .store
            .conversations_for_service("svc-1", 10)
            .await
            .unwrap();
        let conversation_id = conversations[0].id.clone();
        f.store.set_bot_active(&conversation_id, true).await.unwrap();
        let sends_before = f.platform.sent().len();

        // The operator flips the flag while the completion is in flight.
        f.responder
            .toggle_bot_off_during_next_call(f.store.clone(), conversation_id.clone());

        let outcome = f
            .router
            .handle_inbound(&f.service, &inbound("wamid.2", "question"))
            .await
            .unwrap();

        assert!(outcome.suppressed);
        assert!(outcome.to_human);
        assert_eq!(f.platform.sent().len(), sends_before);

        // Only the two contact messages exist; no bot reply was persisted
        // for the second inbound.
        let messages = f.store.messages(&conversation_id, None).await.unwrap();
        let bot_replies = messages
            .iter()
            .filter(|m| m.sender == SenderKind::Bot)
            .count();
        assert_eq!(bot_replies, 1);
    }

    #[tokio::test]
    async fn auth_failure_flags_service_and_alerts_operators() {
        let f = fixture_with(vec![Ok("reply".into())], default_limits()).await;
        f.platform.fail_next_with(SendFailureKind::Auth);

        let err = f
            .router
            .handle_inbound(&f.service, &inbound("wamid.1", "hello"))
            .await
            .unwrap_err();
        assert_eq!(err.send_kind(), Some(SendFailureKind::Auth));

        let service = f.store.service("svc-1").await.unwrap().unwrap();
        assert!(service.needs_reauth);

        let events = f.bus.events();
        assert!(events.iter().any(|(room, e)| room == ADMIN_ROOM && e == "operator_alert"));

        // The bot reply row exists and is marked failed.
        let conversations = f
            .store
            .conversations_for_service("svc-1", 10)
            .await
            .unwrap();
        let messages = f.store.messages(&conversations[0].id, None).await.unwrap();
        assert_eq!(messages[1].delivery_status, DeliveryStatus::Failed);
    }

    #[tokio::test]
    async fn operator_message_is_persisted_and_delivered() {
        let f = fixture_with(vec![Ok("bot reply".into())], default_limits()).await;
        f.router
            .handle_inbound(&f.service, &inbound("wamid.1", "hi"))
            .await
            .unwrap();
        let conversations = f
            .store
            .conversations_for_service("svc-1", 10)
            .await
            .unwrap();

        let message = f
            .router
            .handle_operator_message(
                &f.service,
                &conversations[0].id,
                SenderKind::Human,
                "operator here, how can I help?",
            )
            .await
            .unwrap();

        assert_eq!(message.sender, SenderKind::Human);
        let sent = f.platform.sent();
        assert_eq!(sent.last().unwrap().content, "operator here, how can I help?");

        let stored = f.store.messages(&conversations[0].id, None).await.unwrap();
        assert_eq!(stored.last().unwrap().delivery_status, DeliveryStatus::Sent);
    }
}
