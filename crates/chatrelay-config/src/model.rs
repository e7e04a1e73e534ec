// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the ChatRelay message router.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level ChatRelay configuration.
///
/// Loaded from a TOML file with environment variable overrides. All
/// sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatRelayConfig {
    /// Gateway HTTP/WebSocket server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Daily rate-window limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// AI responder API settings.
    #[serde(default)]
    pub responder: ResponderConfig,

    /// Meta Graph API settings (WhatsApp, Messenger, Instagram).
    #[serde(default)]
    pub meta: MetaConfig,

    /// Telegram Bot API settings.
    #[serde(default)]
    pub telegram: TelegramConfig,
}

/// Gateway server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token for the operator read API and WebSocket handshake.
    /// `None` rejects all authenticated surfaces (fail-closed).
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Static key guarding the internal message/status endpoints
    /// (`X-Webhook-Key` header or `?key=` query param).
    #[serde(default)]
    pub webhook_key: Option<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
            webhook_key: None,
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8085
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Daily rate-window limits.
///
/// All windows reset on the UTC calendar-day boundary. Tenant limits are
/// plan-dependent; the conversation limit is a fixed anti-abuse ceiling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Inbound messages per day for a trial tenant.
    #[serde(default = "default_tenant_daily_trial")]
    pub tenant_daily_trial: u32,

    /// Inbound messages per day for a paying tenant.
    #[serde(default = "default_tenant_daily_paid")]
    pub tenant_daily_paid: u32,

    /// Inbound messages per day per conversation.
    #[serde(default = "default_conversation_daily")]
    pub conversation_daily: u32,

    /// Whether to send the end user a notice when a window is exhausted.
    /// When false, over-limit messages are dropped silently.
    #[serde(default = "default_notify_on_limit")]
    pub notify_on_limit: bool,

    /// Notice text sent when `notify_on_limit` is enabled.
    #[serde(default = "default_limit_notice")]
    pub limit_notice: String,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            tenant_daily_trial: default_tenant_daily_trial(),
            tenant_daily_paid: default_tenant_daily_paid(),
            conversation_daily: default_conversation_daily(),
            notify_on_limit: default_notify_on_limit(),
            limit_notice: default_limit_notice(),
        }
    }
}

fn default_tenant_daily_trial() -> u32 {
    100
}

fn default_tenant_daily_paid() -> u32 {
    2000
}

fn default_conversation_daily() -> u32 {
    50
}

fn default_notify_on_limit() -> bool {
    true
}

fn default_limit_notice() -> String {
    "You have reached today's message limit. Please try again tomorrow.".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("chatrelay").join("chatrelay.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("chatrelay.db"))
        .to_string_lossy()
        .into_owned()
}

/// AI responder API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResponderConfig {
    /// Base URL of the completion API.
    #[serde(default = "default_responder_url")]
    pub base_url: String,

    /// API key. `None` disables the bot path entirely.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier sent with every completion request.
    #[serde(default = "default_responder_model")]
    pub model: String,

    /// Maximum tokens to generate per reply.
    #[serde(default = "default_responder_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_responder_timeout_secs")]
    pub timeout_secs: u64,

    /// How many prior conversation turns to supply as history.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,

    /// Reply sent when the completion API fails, so the end user is never
    /// left unanswered.
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            base_url: default_responder_url(),
            api_key: None,
            model: default_responder_model(),
            max_tokens: default_responder_max_tokens(),
            timeout_secs: default_responder_timeout_secs(),
            history_limit: default_history_limit(),
            fallback_message: default_fallback_message(),
        }
    }
}

fn default_responder_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_responder_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_responder_max_tokens() -> u32 {
    1024
}

fn default_responder_timeout_secs() -> u64 {
    30
}

fn default_history_limit() -> u32 {
    20
}

fn default_fallback_message() -> String {
    "Sorry, I could not process your message right now. A human will follow up shortly."
        .to_string()
}

/// Meta Graph API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetaConfig {
    /// Graph API base URL. Overridable for tests.
    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,

    /// Graph API version segment.
    #[serde(default = "default_graph_version")]
    pub graph_version: String,

    /// Outbound send timeout in seconds.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            graph_base_url: default_graph_base_url(),
            graph_version: default_graph_version(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

fn default_graph_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_graph_version() -> String {
    "v19.0".to_string()
}

fn default_send_timeout_secs() -> u64 {
    15
}

/// Telegram Bot API configuration.
///
/// Bot tokens are per-tenant credentials stored with the client service;
/// only process-level knobs live here.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Bot API base URL. Overridable for tests.
    #[serde(default = "default_telegram_base_url")]
    pub api_base_url: String,

    /// Outbound send timeout in seconds.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_telegram_base_url(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

fn default_telegram_base_url() -> String {
    "https://api.telegram.org".to_string()
}
