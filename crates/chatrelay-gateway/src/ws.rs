// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime WebSocket handler.
//!
//! Client -> server frames are `{"event": "...", "data": {...}}`; server ->
//! client frames use the same shape. Operators authenticate with the
//! bearer token passed as a `?token=` query param at handshake.
//! Unauthenticated connections are admitted as anonymous guest sockets and
//! may only use the WebChat events -- joining tenant service rooms or the
//! admin room requires authentication.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use chatrelay_core::traits::Broadcaster;
use chatrelay_core::traits::broadcast::{ADMIN_ROOM, conversation_room, service_room};
use chatrelay_core::types::{InboundMessage, MessageKind, Platform};
use chatrelay_storage::ClientService;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::rooms::{Frame, RoomRegistry};
use crate::server::GatewayState;

/// Client -> server events.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
enum ClientEvent {
    JoinService {
        service_id: String,
    },
    LeaveService {
        service_id: String,
    },
    JoinConversation {
        conversation_id: String,
    },
    LeaveConversation {
        conversation_id: String,
    },
    TypingStart {
        conversation_id: String,
    },
    TypingStop {
        conversation_id: String,
    },
    MarkRead {
        conversation_id: String,
    },
    JoinAdmin,
    JoinWebchat {
        service_id: String,
        contact_id: String,
        #[serde(default)]
        contact_name: Option<String>,
    },
    WebchatMessage {
        text: String,
        #[serde(default)]
        message_id: Option<String>,
    },
}

/// Events a guest (unauthenticated) socket may use.
fn guest_allowed(event: &ClientEvent) -> bool {
    matches!(
        event,
        ClientEvent::JoinWebchat { .. } | ClientEvent::WebchatMessage { .. }
    )
}

/// State of an established WebChat widget session on this connection.
struct WebchatSession {
    service: Arc<ClientService>,
    contact_id: String,
    contact_name: Option<String>,
    conversation_id: String,
}

/// WebSocket upgrade handler. Authentication happens here, from the
/// `?token=` query param, before the upgrade completes.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<GatewayState>,
) -> Response {
    let authenticated = state.auth.token_matches(params.get("token").map(String::as_str));
    ws.on_upgrade(move |socket| handle_socket(socket, state, authenticated))
}

async fn handle_socket(socket: WebSocket, state: GatewayState, authenticated: bool) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let conn_id = uuid::Uuid::new_v4().to_string();

    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();

    // Forward queued frames to the socket.
    let sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    debug!(conn_id = conn_id.as_str(), authenticated, "socket connected");
    let mut webchat: Option<WebchatSession> = None;

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                let event: ClientEvent = match serde_json::from_str(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "invalid WebSocket frame");
                        send_error(&tx, "malformed frame");
                        continue;
                    }
                };

                if !authenticated && !guest_allowed(&event) {
                    send_error(&tx, "unauthorized");
                    continue;
                }

                handle_event(&state, &conn_id, &tx, &mut webchat, event).await;
            }
            Message::Close(_) => break,
            _ => {} // Binary and ping/pong are ignored.
        }
    }

    state.rooms.leave_all(&conn_id);
    sender_task.abort();
    debug!(conn_id = conn_id.as_str(), "socket disconnected");
}

async fn handle_event(
    state: &GatewayState,
    conn_id: &str,
    tx: &mpsc::UnboundedSender<Frame>,
    webchat: &mut Option<WebchatSession>,
    event: ClientEvent,
) {
    match event {
        ClientEvent::JoinService { service_id } => {
            let service = match state.store.service(&service_id).await {
                Ok(Some(service)) => service,
                _ => {
                    send_error(tx, "unknown service");
                    return;
                }
            };
            let room = service_room(&service.tenant_id, service.platform);
            state.rooms.join(&room, conn_id, tx.clone());
            send_frame(
                tx,
                "joined_service",
                serde_json::json!({"service_id": service_id, "room": room}),
            );
        }
        ClientEvent::LeaveService { service_id } => {
            if let Ok(Some(service)) = state.store.service(&service_id).await {
                let room = service_room(&service.tenant_id, service.platform);
                state.rooms.leave(&room, conn_id);
            }
        }
        ClientEvent::JoinConversation { conversation_id } => {
            match state.store.conversation(&conversation_id).await {
                Ok(Some(_)) => {
                    state
                        .rooms
                        .join(&conversation_room(&conversation_id), conn_id, tx.clone());
                }
                _ => send_error(tx, "unknown conversation"),
            }
        }
        ClientEvent::LeaveConversation { conversation_id } => {
            state.rooms.leave(&conversation_room(&conversation_id), conn_id);
        }
        ClientEvent::TypingStart { conversation_id } => {
            state.rooms.publish(
                &conversation_room(&conversation_id),
                "typing",
                serde_json::json!({"source": "operator", "active": true}),
            );
        }
        ClientEvent::TypingStop { conversation_id } => {
            state.rooms.publish(
                &conversation_room(&conversation_id),
                "typing",
                serde_json::json!({"source": "operator", "active": false}),
            );
        }
        ClientEvent::MarkRead { conversation_id } => {
            mark_read(state, &conversation_id, tx).await;
        }
        ClientEvent::JoinAdmin => {
            state.rooms.join(ADMIN_ROOM, conn_id, tx.clone());
        }
        ClientEvent::JoinWebchat {
            service_id,
            contact_id,
            contact_name,
        } => {
            join_webchat(state, conn_id, tx, webchat, service_id, contact_id, contact_name)
                .await;
        }
        ClientEvent::WebchatMessage { text, message_id } => {
            webchat_message(state, tx, webchat.as_ref(), text, message_id).await;
        }
    }
}

async fn mark_read(state: &GatewayState, conversation_id: &str, tx: &mpsc::UnboundedSender<Frame>) {
    let conversation = match state.store.conversation(conversation_id).await {
        Ok(Some(conversation)) => conversation,
        _ => {
            send_error(tx, "unknown conversation");
            return;
        }
    };
    if let Err(e) = state.store.mark_read(conversation_id).await {
        warn!(error = %e, "mark_read failed");
        return;
    }
    let payload = serde_json::json!({"conversation_id": conversation_id});
    state.rooms.publish(
        &service_room(&conversation.tenant_id, conversation.platform),
        "messages_read",
        payload.clone(),
    );
    state
        .rooms
        .publish(&conversation_room(conversation_id), "messages_read", payload);
}

async fn join_webchat(
    state: &GatewayState,
    conn_id: &str,
    tx: &mpsc::UnboundedSender<Frame>,
    webchat: &mut Option<WebchatSession>,
    service_id: String,
    contact_id: String,
    contact_name: Option<String>,
) {
    let resolved = state
        .pipeline
        .resolver()
        .resolve(Platform::WebChat, &service_id)
        .await;
    let service = match resolved {
        Ok(Some(service)) => service,
        _ => {
            send_error(tx, "unknown webchat service");
            return;
        }
    };

    let (conversation, _) = match state
        .store
        .upsert_conversation(&service, &contact_id, contact_name.as_deref())
        .await
    {
        Ok(pair) => pair,
        Err(e) => {
            warn!(error = %e, "webchat conversation upsert failed");
            send_error(tx, "join failed");
            return;
        }
    };

    state
        .rooms
        .join(&conversation_room(&conversation.id), conn_id, tx.clone());
    send_frame(
        tx,
        "joined_webchat",
        serde_json::json!({"conversation_id": conversation.id}),
    );
    *webchat = Some(WebchatSession {
        service,
        contact_id,
        contact_name,
        conversation_id: conversation.id,
    });
}

async fn webchat_message(
    state: &GatewayState,
    tx: &mpsc::UnboundedSender<Frame>,
    webchat: Option<&WebchatSession>,
    text: String,
    message_id: Option<String>,
) {
    let Some(session) = webchat else {
        send_error(tx, "join_webchat first");
        return;
    };

    let inbound = InboundMessage {
        platform: Platform::WebChat,
        contact_id: session.contact_id.clone(),
        external_id: message_id.unwrap_or_else(|| format!("wc-{}", uuid::Uuid::new_v4())),
        content: text,
        kind: MessageKind::Text,
        contact_name: session.contact_name.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    if let Err(e) = state
        .pipeline
        .dispatcher()
        .handle_inbound(&session.service, &inbound)
        .await
    {
        warn!(
            conversation_id = session.conversation_id.as_str(),
            error = %e,
            "webchat message dispatch failed"
        );
        send_error(tx, "message failed");
    }
}

fn send_frame(tx: &mpsc::UnboundedSender<Frame>, event: &str, payload: serde_json::Value) {
    let _ = tx.send(RoomRegistry::frame(event, &payload));
}

fn send_error(tx: &mpsc::UnboundedSender<Frame>, reason: &str) {
    send_frame(tx, "error", serde_json::json!({"reason": reason}));
}
