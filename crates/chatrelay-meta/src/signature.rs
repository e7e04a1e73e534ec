// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HMAC-SHA256 verification of Meta webhook signatures.
//!
//! Meta signs the exact raw request bytes with the app secret and sends the
//! hex digest in `X-Hub-Signature-256` as `sha256=<hex>`. Verification must
//! run over the bytes as received, before any JSON parsing, and fails
//! closed on any malformed input.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify an `X-Hub-Signature-256` header value against the raw body.
///
/// The digest comparison is constant-time via `Mac::verify_slice`.
pub fn verify_signature(raw_body: &[u8], signature_header: &str, app_secret: &str) -> bool {
    let Some(digest_hex) = signature_header.trim().strip_prefix("sha256=") else {
        return false;
    };
    let Ok(digest) = hex::decode(digest_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(raw_body);
    mac.verify_slice(&digest).is_ok()
}

/// Compute the `sha256=<hex>` header value for a body. Test helper for
/// producing valid signed fixtures.
pub fn sign(raw_body: &[u8], app_secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(raw_body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
