// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication guards for the gateway.
//!
//! Two independent guards:
//! - Bearer token (`Authorization: Bearer <token>`) for the operator read
//!   API and the WebSocket handshake.
//! - Static webhook key (`X-Webhook-Key` header or `?key=` query param)
//!   for the internal message/status endpoints -- an operational guard,
//!   not cryptographic.
//!
//! When no token/key is configured, the guarded surface rejects all
//! requests (fail-closed).

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

/// Authentication configuration for the gateway.
#[derive(Clone)]
pub struct AuthConfig {
    /// Expected bearer token. If `None`, all authenticated surfaces reject.
    pub bearer_token: Option<String>,
    /// Static key for internal endpoints. If `None`, they reject.
    pub webhook_key: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "webhook_key",
                &self.webhook_key.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

impl AuthConfig {
    /// Check a bearer header value (`Bearer <token>`) against config.
    pub fn bearer_matches(&self, header: Option<&str>) -> bool {
        let Some(ref expected) = self.bearer_token else {
            return false;
        };
        header
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected)
    }

    /// Check a raw token (WebSocket handshake query param) against config.
    pub fn token_matches(&self, token: Option<&str>) -> bool {
        match (&self.bearer_token, token) {
            (Some(expected), Some(given)) => expected == given,
            _ => false,
        }
    }

    /// Check the internal webhook key from header or query param.
    pub fn webhook_key_matches(&self, header: Option<&str>, query: Option<&str>) -> bool {
        let Some(ref expected) = self.webhook_key else {
            return false;
        };
        header == Some(expected.as_str()) || query == Some(expected.as_str())
    }
}

/// Middleware guarding the operator read API with the bearer token.
pub async fn bearer_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth.bearer_token.is_none() {
        tracing::error!("gateway has no bearer token configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok());

    if auth.bearer_matches(header) {
        Ok(next.run(request).await)
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            bearer_token: Some("op-token".into()),
            webhook_key: Some("hook-key".into()),
        }
    }

    #[test]
    fn bearer_matches_exact_token() {
        let auth = config();
        assert!(auth.bearer_matches(Some("Bearer op-token")));
        assert!(!auth.bearer_matches(Some("Bearer wrong")));
        assert!(!auth.bearer_matches(Some("op-token")));
        assert!(!auth.bearer_matches(None));
    }

    #[test]
    fn bearer_fails_closed_without_config() {
        let auth = AuthConfig {
            bearer_token: None,
            webhook_key: None,
        };
        assert!(!auth.bearer_matches(Some("Bearer anything")));
        assert!(!auth.token_matches(Some("anything")));
    }

    #[test]
    fn webhook_key_accepts_header_or_query() {
        let auth = config();
        assert!(auth.webhook_key_matches(Some("hook-key"), None));
        assert!(auth.webhook_key_matches(None, Some("hook-key")));
        assert!(!auth.webhook_key_matches(Some("wrong"), Some("wrong")));
        assert!(!auth.webhook_key_matches(None, None));
    }

    #[test]
    fn webhook_key_fails_closed_without_config() {
        let auth = AuthConfig {
            bearer_token: None,
            webhook_key: None,
        };
        assert!(!auth.webhook_key_matches(Some("anything"), None));
    }

    #[test]
    fn debug_redacts_secrets() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("op-token"));
        assert!(!rendered.contains("hook-key"));
        assert!(rendered.contains("[redacted]"));
    }
}
