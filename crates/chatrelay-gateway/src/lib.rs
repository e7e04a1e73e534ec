// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket gateway for ChatRelay.
//!
//! Exposes the platform webhook endpoints (Meta unified webhook with the
//! GET verification handshake, Telegram bot webhook), the internal
//! message/status endpoints, the operator read API, and the realtime
//! WebSocket with room-partitioned fan-out. Also home to the WebChat
//! platform adapter, whose transport is the socket itself.

pub mod auth;
pub mod handlers;
pub mod rooms;
pub mod server;
pub mod webchat;
pub mod ws;

pub use auth::AuthConfig;
pub use rooms::RoomRegistry;
pub use server::{GatewayState, HealthState, build_router, start_server};
pub use webchat::WebChatChannel;
