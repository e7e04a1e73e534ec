// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the ChatRelay message router.

use thiserror::Error;

use crate::types::{Platform, RateScope};

/// Classification of an outbound send failure.
///
/// Decides the retry policy in the dispatch router: transient failures are
/// retried with bounded backoff, permanent failures are not, and auth
/// failures additionally flag the client service for re-authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailureKind {
    /// Network error, timeout, 429, or 5xx from the platform API.
    Transient,
    /// 4xx the platform will reject every time (malformed request, bad recipient).
    Permanent,
    /// 401/403 -- the stored credential is invalid or expired.
    Auth,
}

impl std::fmt::Display for SendFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendFailureKind::Transient => write!(f, "transient"),
            SendFailureKind::Permanent => write!(f, "permanent"),
            SendFailureKind::Auth => write!(f, "auth"),
        }
    }
}

/// The primary error type used across all ChatRelay crates.
#[derive(Debug, Error)]
pub enum ChatRelayError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Webhook signature verification failed. Rejected before any processing.
    #[error("signature verification failed for {platform}")]
    Signature { platform: Platform },

    /// No active client service matches the platform identifier.
    ///
    /// The webhook is still acknowledged with 200 to stop platform retries;
    /// the pipeline does not advance.
    #[error("no client service for {platform} identifier {identifier}")]
    UnknownTenant {
        platform: Platform,
        identifier: String,
    },

    /// A daily rate window is exhausted. Signaled to the dispatch router,
    /// which owns the notify-or-drop policy.
    #[error("rate limit exceeded for {scope}")]
    RateLimited { scope: RateScope },

    /// Outbound send to a platform API failed.
    #[error("{kind} send failure: {message}")]
    Send {
        kind: SendFailureKind,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// AI responder errors (API failure, malformed completion).
    #[error("responder error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatRelayError {
    /// Returns the send-failure classification, if this is a send error.
    pub fn send_kind(&self) -> Option<SendFailureKind> {
        match self {
            ChatRelayError::Send { kind, .. } => Some(*kind),
            ChatRelayError::Timeout { .. } => Some(SendFailureKind::Transient),
            _ => None,
        }
    }
}
