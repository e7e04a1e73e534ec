// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports `./chatrelay.toml` > `~/.config/chatrelay/chatrelay.toml` >
//! `/etc/chatrelay/chatrelay.toml` with environment variable overrides via
//! the `CHATRELAY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ChatRelayConfig;

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/chatrelay/chatrelay.toml` (system-wide)
/// 3. `~/.config/chatrelay/chatrelay.toml` (user XDG config)
/// 4. `./chatrelay.toml` (local directory)
/// 5. `CHATRELAY_*` environment variables
pub fn load_config() -> Result<ChatRelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChatRelayConfig::default()))
        .merge(Toml::file("/etc/chatrelay/chatrelay.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("chatrelay/chatrelay.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("chatrelay.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no file or env lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<ChatRelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChatRelayConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ChatRelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChatRelayConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names. For example, `CHATRELAY_SERVER_BEARER_TOKEN`
/// must map to `server.bearer_token`, not `server.bearer.token`.
fn env_provider() -> Env {
    Env::prefixed("CHATRELAY_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: CHATRELAY_SERVER_BEARER_TOKEN -> "server_bearer_token"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("limits_", "limits.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("responder_", "responder.", 1)
            .replacen("meta_", "meta.", 1)
            .replacen("telegram_", "telegram.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_yields_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.server.port, 8085);
        assert_eq!(config.limits.conversation_daily, 50);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = load_config_from_str(
            r#"
            [server]
            port = 9090
            bearer_token = "op-token"

            [limits]
            tenant_daily_trial = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.bearer_token.as_deref(), Some("op-token"));
        assert_eq!(config.limits.tenant_daily_trial, 5);
        // Untouched sections keep defaults.
        assert_eq!(config.limits.tenant_daily_paid, 2000);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(load_config_from_str("[server\nport = 1").is_err());
    }

    #[test]
    fn unknown_key_is_an_error() {
        let result = load_config_from_str("[server]\nprot = 1\n");
        assert!(result.is_err());
    }
}
