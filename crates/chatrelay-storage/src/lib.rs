// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the ChatRelay message router.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, typed CRUD for
//! client services, conversations, and messages, and the in-memory daily
//! rate windows enforced by the [`ConversationStore`].

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod ratelimit;
pub mod store;

pub use database::Database;
pub use models::*;
pub use queries::messages::StatusAdvance;
pub use ratelimit::RateWindows;
pub use store::{ConversationStore, RecordOutcome, StoreLimits};
