// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end HTTP tests for the gateway: webhook ingestion, the Meta
//! handshake, auth guards, and the operator read API, driven through the
//! axum router with tower's `oneshot`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chatrelay_config::model::ChatRelayConfig;
use chatrelay_core::traits::Broadcaster;
use chatrelay_core::types::{Platform, ServiceCredentials, ServiceStatus};
use chatrelay_gateway::{AuthConfig, GatewayState, HealthState, RoomRegistry, WebChatChannel};
use chatrelay_meta::MetaChannel;
use chatrelay_meta::signature::sign;
use chatrelay_router::{
    AdapterRegistry, DeliveryTracker, DispatchPolicy, DispatchRouter, InboundPipeline,
    TenantResolver,
};
use chatrelay_storage::{
    ClientService, ConversationStore, Database, StoreLimits, queries,
};
use chatrelay_telegram::TelegramChannel;
use tower::ServiceExt;

const META_SECRET: &str = "meta-app-secret";

struct Fixture {
    app: Router,
    store: Arc<ConversationStore>,
    _dir: tempfile::TempDir,
}

async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gateway.db");
    let db = Database::open(path.to_str().unwrap()).await.unwrap();
    queries::services::insert_tenant(&db, "tenant-1", "Acme Stores")
        .await
        .unwrap();

    let config = ChatRelayConfig::default();
    let store = Arc::new(ConversationStore::new(db, StoreLimits::from(&config.limits)));

    let now = chrono::Utc::now().to_rfc3339();
    let services = [
        ClientService {
            id: "svc-wa".into(),
            tenant_id: "tenant-1".into(),
            platform: Platform::WhatsApp,
            status: ServiceStatus::Active,
            credentials: ServiceCredentials {
                access_token: Some("wa-token".into()),
                app_secret: Some(META_SECRET.into()),
                verify_token: Some("verify-me".into()),
                phone_number_id: Some("phone-1".into()),
                ..Default::default()
            },
            personality: None,
            needs_reauth: false,
            created_at: now.clone(),
            updated_at: now.clone(),
        },
        ClientService {
            id: "svc-tg".into(),
            tenant_id: "tenant-1".into(),
            platform: Platform::Telegram,
            status: ServiceStatus::Active,
            credentials: ServiceCredentials {
                bot_token: Some("12345:TOKEN".into()),
                webhook_secret: Some("tg-secret".into()),
                ..Default::default()
            },
            personality: None,
            needs_reauth: false,
            created_at: now.clone(),
            updated_at: now.clone(),
        },
        ClientService {
            id: "svc-wc".into(),
            tenant_id: "tenant-1".into(),
            platform: Platform::WebChat,
            status: ServiceStatus::Active,
            credentials: ServiceCredentials::default(),
            personality: None,
            needs_reauth: false,
            created_at: now.clone(),
            updated_at: now,
        },
    ];
    for service in &services {
        queries::services::insert_service(store.database(), service)
            .await
            .unwrap();
    }

    let mut registry = AdapterRegistry::new();
    for platform in [Platform::WhatsApp, Platform::Messenger, Platform::Instagram] {
        registry.register(Arc::new(MetaChannel::new(platform, &config.meta).unwrap()));
    }
    registry.register(Arc::new(TelegramChannel::new(&config.telegram).unwrap()));
    registry.register(Arc::new(WebChatChannel));
    let registry = Arc::new(registry);

    let rooms = Arc::new(RoomRegistry::new());
    let bus: Arc<dyn Broadcaster> = rooms.clone();

    let resolver = Arc::new(TenantResolver::new(store.clone()));
    let dispatcher = Arc::new(DispatchRouter::new(
        store.clone(),
        registry.clone(),
        None, // no AI responder: inbound messages queue for humans
        bus.clone(),
        DispatchPolicy::from_config(&config),
    ));
    let tracker = Arc::new(DeliveryTracker::new(store.clone(), bus));
    let pipeline = Arc::new(InboundPipeline::new(resolver, registry, dispatcher, tracker));

    let state = GatewayState {
        pipeline,
        store: store.clone(),
        rooms,
        auth: AuthConfig {
            bearer_token: Some("op-token".into()),
            webhook_key: Some("hook-key".into()),
        },
        health: HealthState {
            start_time: Instant::now(),
        },
    };

    Fixture {
        app: chatrelay_gateway::build_router(state),
        store,
        _dir: dir,
    }
}

fn whatsapp_body(external_id: &str, text: &str) -> String {
    serde_json::json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "changes": [{
                "field": "messages",
                "value": {
                    "metadata": {"phone_number_id": "phone-1"},
                    "contacts": [{"profile": {"name": "Ana"}, "wa_id": "5511999990000"}],
                    "messages": [{
                        "from": "5511999990000",
                        "id": external_id,
                        "timestamp": "1767225600",
                        "type": "text",
                        "text": {"body": text}
                    }]
                }
            }]
        }]
    })
    .to_string()
}

fn telegram_body(message_id: i64, text: &str) -> String {
    serde_json::json!({
        "update_id": 900,
        "message": {
            "message_id": message_id,
            "date": 1767225600,
            "chat": {"id": 5512345, "type": "private", "first_name": "Ana"},
            "from": {"id": 5512345, "is_bot": false, "first_name": "Ana"},
            "text": text,
        }
    })
    .to_string()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Webhook processing is spawned after the ack; poll until the assertion
/// holds or the deadline passes.
async fn wait_for_messages(store: &ConversationStore, service_id: &str, expected: usize) -> usize {
    for _ in 0..100 {
        let conversations = store.conversations_for_service(service_id, 10).await.unwrap();
        if let Some(conversation) = conversations.first() {
            let messages = store.messages(&conversation.id, None).await.unwrap();
            if messages.len() >= expected {
                return messages.len();
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    0
}

#[tokio::test]
async fn health_endpoint_is_public() {
    let f = fixture().await;
    let response = f
        .app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("\"status\":\"ok\""));
}

#[tokio::test]
async fn meta_handshake_echoes_challenge_exactly() {
    let f = fixture().await;
    let response = f
        .app
        .oneshot(
            Request::builder()
                .uri("/webhooks/meta?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1234")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "1234");
}

#[tokio::test]
async fn meta_handshake_rejects_wrong_token() {
    let f = fixture().await;
    let response = f
        .app
        .oneshot(
            Request::builder()
                .uri("/webhooks/meta?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=1234")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn signed_meta_webhook_is_accepted_and_stored() {
    let f = fixture().await;
    let body = whatsapp_body("wamid.E2E", "hello via webhook");
    let signature = sign(body.as_bytes(), META_SECRET);

    let response = f
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/meta")
                .header("content-type", "application/json")
                .header("x-hub-signature-256", signature)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "EVENT_RECEIVED");

    assert_eq!(wait_for_messages(&f.store, "svc-wa", 1).await, 1);
}

#[tokio::test]
async fn tampered_meta_webhook_is_rejected() {
    let f = fixture().await;
    let body = whatsapp_body("wamid.TAMPER", "original");
    let signature = sign(body.as_bytes(), META_SECRET);
    let tampered = body.replace("original", "tampered");

    let response = f
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/meta")
                .header("x-hub-signature-256", signature)
                .body(Body::from(tampered))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_meta_identifier_still_acknowledges() {
    let f = fixture().await;
    let body = serde_json::json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "changes": [{"value": {"metadata": {"phone_number_id": "ghost-phone"}}}]
        }]
    })
    .to_string();
    let signature = sign(body.as_bytes(), META_SECRET);

    let response = f
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/meta")
                .header("x-hub-signature-256", signature)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    // 200 so Meta stops retrying a webhook we will never accept.
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn redelivered_meta_webhook_stores_once() {
    let f = fixture().await;
    let body = whatsapp_body("wamid.REPLAY", "delivered twice");
    let signature = sign(body.as_bytes(), META_SECRET);

    for _ in 0..2 {
        let response = f
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhooks/meta")
                    .header("x-hub-signature-256", signature.clone())
                    .body(Body::from(body.clone()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(wait_for_messages(&f.store, "svc-wa", 1).await, 1);
    // Give the second (duplicate) delivery time to have been processed.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(wait_for_messages(&f.store, "svc-wa", 1).await, 1);
}

#[tokio::test]
async fn telegram_webhook_with_secret_is_accepted() {
    let f = fixture().await;
    let response = f
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/telegram/12345:TOKEN")
                .header("content-type", "application/json")
                .header("x-telegram-bot-api-secret-token", "tg-secret")
                .body(Body::from(telegram_body(88, "ola")))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(wait_for_messages(&f.store, "svc-tg", 1).await, 1);
}

#[tokio::test]
async fn telegram_webhook_with_wrong_secret_is_rejected() {
    let f = fixture().await;
    let response = f
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/telegram/12345:TOKEN")
                .header("x-telegram-bot-api-secret-token", "wrong")
                .body(Body::from(telegram_body(89, "ola")))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn telegram_webhook_for_unknown_bot_acknowledges() {
    let f = fixture().await;
    let response = f
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/telegram/99999:GHOST")
                .body(Body::from(telegram_body(90, "ola")))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn internal_endpoints_require_the_webhook_key() {
    let f = fixture().await;
    let response = f
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/internal/status")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"platform": "whatsapp", "external_message_id": "x", "status": "read"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn internal_status_with_key_acknowledges_unmatched_id() {
    let f = fixture().await;
    let response = f
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/internal/status")
                .header("content-type", "application/json")
                .header("x-webhook-key", "hook-key")
                .body(Body::from(
                    r#"{"platform": "whatsapp", "external_message_id": "wamid.GHOST", "status": "read"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    // Unmatched ids are logged and discarded, not errors.
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn internal_message_persists_and_returns_the_message() {
    let f = fixture().await;

    // Seed a WebChat conversation (its adapter delivers in-process).
    let service = f.store.service("svc-wc").await.unwrap().unwrap();
    let (conversation, _) = f
        .store
        .upsert_conversation(&service, "visitor-9", Some("Visitor"))
        .await
        .unwrap();

    let body = serde_json::json!({
        "service_id": "svc-wc",
        "conversation_id": conversation.id,
        "content": "operator follow-up",
    })
    .to_string();

    let response = f
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/internal/messages?key=hook-key")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("operator follow-up"));
    assert!(body.contains("\"sender\":\"human\""));

    let messages = f.store.messages(&conversation.id, None).await.unwrap();
    assert_eq!(messages.len(), 1);
}

#[tokio::test]
async fn read_api_requires_bearer_token() {
    let f = fixture().await;
    let response = f
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/conversations?service_id=svc-wa")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = f
        .app
        .oneshot(
            Request::builder()
                .uri("/v1/conversations?service_id=svc-wa")
                .header("authorization", "Bearer op-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn invalidate_endpoint_clears_resolver_cache() {
    let f = fixture().await;
    let response = f
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/internal/services/svc-wa/invalidate")
                .header("x-webhook-key", "hook-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
