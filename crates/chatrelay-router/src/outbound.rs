// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound delivery with bounded exponential backoff.
//!
//! Only transient failures (network errors, timeouts, 429/5xx) are retried;
//! permanent and auth failures surface immediately for the dispatch router
//! to handle.

use std::time::Duration;

use chatrelay_core::ChatRelayError;
use chatrelay_core::error::SendFailureKind;
use chatrelay_core::traits::PlatformAdapter;
use chatrelay_core::types::{MessageId, OutboundReply, ServiceCredentials};
use tracing::warn;

/// Maximum send attempts, counting the first.
pub const MAX_SEND_ATTEMPTS: u32 = 3;

/// Base delay doubled per retry.
const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Send a reply, retrying transient failures with exponential backoff.
pub async fn send_with_retry(
    adapter: &dyn PlatformAdapter,
    creds: &ServiceCredentials,
    reply: &OutboundReply,
) -> Result<MessageId, ChatRelayError> {
    send_with_retry_after(adapter, creds, reply, BACKOFF_BASE).await
}

/// [`send_with_retry`] with an explicit backoff base, for tests that must
/// not sleep for real.
pub async fn send_with_retry_after(
    adapter: &dyn PlatformAdapter,
    creds: &ServiceCredentials,
    reply: &OutboundReply,
    backoff_base: Duration,
) -> Result<MessageId, ChatRelayError> {
    let mut last_error = None;

    for attempt in 0..MAX_SEND_ATTEMPTS {
        if attempt > 0 {
            let delay = backoff_base * 2u32.pow(attempt - 1);
            tokio::time::sleep(delay).await;
        }

        match adapter.send(creds, reply).await {
            Ok(id) => return Ok(id),
            Err(err) => match err.send_kind() {
                Some(SendFailureKind::Transient) => {
                    warn!(
                        attempt = attempt + 1,
                        platform = %adapter.platform(),
                        error = %err,
                        "transient send failure"
                    );
                    last_error = Some(err);
                }
                // Permanent and auth failures are not retried.
                _ => return Err(err),
            },
        }
    }

    Err(last_error.unwrap_or_else(|| ChatRelayError::Send {
        kind: SendFailureKind::Transient,
        message: "send failed after retries".into(),
        source: None,
    }))
}
