// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Full-pipeline test harness over a scratch database.
//!
//! Wires a `ConversationStore` (tempfile SQLite), a [`MockPlatform`], a
//! [`MockResponder`], and a [`RecordingBus`] into a real
//! [`InboundPipeline`], so integration tests drive the same code path the
//! gateway does: prepare -> process -> dispatch -> deliver.

use std::sync::Arc;

use chatrelay_core::traits::{Broadcaster, ResponderAdapter};
use chatrelay_core::types::{Platform, ServiceCredentials, ServiceStatus};
use chatrelay_router::{
    AdapterRegistry, DeliveryTracker, DispatchPolicy, DispatchRouter, InboundPipeline,
    TenantResolver,
};
use chatrelay_storage::{ClientService, ConversationStore, Database, StoreLimits, queries};

use crate::mock_platform::MockPlatform;
use crate::mock_responder::MockResponder;
use crate::recording_bus::RecordingBus;

pub const TENANT_ID: &str = "tenant-test";
pub const SERVICE_ID: &str = "svc-test";
pub const WEBHOOK_SECRET: &str = "harness-secret";

pub struct PipelineHarness {
    pub store: Arc<ConversationStore>,
    pub pipeline: Arc<InboundPipeline>,
    pub platform: Arc<MockPlatform>,
    pub responder: Arc<MockResponder>,
    pub bus: Arc<RecordingBus>,
    pub service: ClientService,
    _dir: tempfile::TempDir,
}

impl PipelineHarness {
    /// Harness with default limits and an active (paid) service on the
    /// Telegram platform tag.
    pub async fn new() -> Self {
        Self::builder().build().await
    }

    pub fn builder() -> PipelineHarnessBuilder {
        PipelineHarnessBuilder::default()
    }
}

pub struct PipelineHarnessBuilder {
    limits: StoreLimits,
    status: ServiceStatus,
    responder_enabled: bool,
    policy: DispatchPolicy,
}

impl Default for PipelineHarnessBuilder {
    fn default() -> Self {
        Self {
            limits: StoreLimits {
                tenant_daily_trial: 100,
                tenant_daily_paid: 2000,
                conversation_daily: 50,
            },
            status: ServiceStatus::Active,
            responder_enabled: true,
            policy: DispatchPolicy {
                notify_on_limit: true,
                limit_notice: "daily limit reached".into(),
                fallback_message: "please try again later".into(),
                history_limit: 20,
            },
        }
    }
}

impl PipelineHarnessBuilder {
    pub fn limits(mut self, limits: StoreLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn service_status(mut self, status: ServiceStatus) -> Self {
        self.status = status;
        self
    }

    /// Disable the AI responder: inbound messages queue for humans.
    pub fn without_responder(mut self) -> Self {
        self.responder_enabled = false;
        self
    }

    pub fn policy(mut self, policy: DispatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn build(self) -> PipelineHarness {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("harness.db");
        let db = Database::open(path.to_str().expect("utf8 path"))
            .await
            .expect("open database");
        queries::services::insert_tenant(&db, TENANT_ID, "Harness Tenant")
            .await
            .expect("insert tenant");

        let store = Arc::new(ConversationStore::new(db, self.limits));

        let now = chrono::Utc::now().to_rfc3339();
        let service = ClientService {
            id: SERVICE_ID.to_string(),
            tenant_id: TENANT_ID.to_string(),
            platform: Platform::Telegram,
            status: self.status,
            credentials: ServiceCredentials {
                bot_token: Some("12345:HARNESS".into()),
                webhook_secret: Some(WEBHOOK_SECRET.into()),
                ..Default::default()
            },
            personality: Some("You are the harness assistant.".into()),
            needs_reauth: false,
            created_at: now.clone(),
            updated_at: now,
        };
        queries::services::insert_service(store.database(), &service)
            .await
            .expect("insert service");

        let platform = Arc::new(MockPlatform::new(Platform::Telegram));
        let mut registry = AdapterRegistry::new();
        registry.register(platform.clone());
        let registry = Arc::new(registry);

        let responder = Arc::new(MockResponder::new());
        let bus = Arc::new(RecordingBus::new());

        let responder_arg: Option<Arc<dyn ResponderAdapter>> = if self.responder_enabled {
            Some(responder.clone())
        } else {
            None
        };
        let bus_arg: Arc<dyn Broadcaster> = bus.clone();

        let resolver = Arc::new(TenantResolver::new(store.clone()));
        let dispatcher = Arc::new(DispatchRouter::new(
            store.clone(),
            registry.clone(),
            responder_arg,
            bus_arg.clone(),
            self.policy,
        ));
        let tracker = Arc::new(DeliveryTracker::new(store.clone(), bus_arg));
        let pipeline = Arc::new(InboundPipeline::new(resolver, registry, dispatcher, tracker));

        PipelineHarness {
            store,
            pipeline,
            platform,
            responder,
            bus,
            service,
            _dir: dir,
        }
    }
}
