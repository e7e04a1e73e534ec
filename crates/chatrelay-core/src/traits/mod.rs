// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the ChatRelay plugin architecture.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod broadcast;
pub mod platform;
pub mod responder;

// Re-export all traits at the traits module level for convenience.
pub use adapter::PluginAdapter;
pub use broadcast::Broadcaster;
pub use platform::PlatformAdapter;
pub use responder::ResponderAdapter;
