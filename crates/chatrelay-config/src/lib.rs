// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the ChatRelay message router.
//!
//! Serde model structs with compiled defaults, layered TOML/env loading via
//! Figment, and `deny_unknown_fields` everywhere so typos fail at startup
//! instead of silently using defaults.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::ChatRelayConfig;
