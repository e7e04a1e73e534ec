// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the ChatRelay message router.
//!
//! This crate provides the foundational trait definitions, error types, and
//! the canonical message model used throughout the ChatRelay workspace. All
//! platform adapters implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{ChatRelayError, SendFailureKind};
pub use types::{AdapterType, DeliveryStatus, HealthStatus, MessageId, Platform};

// Re-export all adapter traits at crate root.
pub use traits::{Broadcaster, PlatformAdapter, PluginAdapter, ResponderAdapter};
