//! Webhook signature verification.
//!
//! Inbound webhooks carry a hex-encoded HMAC-SHA256 of the raw request body
//! in the `X-Screenfix-Signature` header. Verification never rejects the
//! request; the outcome is reported back to the caller, including the
//! "no secret configured" case so misconfiguration is observable instead of
//! silently failing open.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex-encoded signature.
pub const SIGNATURE_HEADER: &str = "x-screenfix-signature";

/// Outcome of verifying one webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Signature matched the shared secret.
    Verified,
    /// Signature missing or mismatched.
    Failed,
    /// No shared secret is configured; nothing could be checked.
    NotConfigured,
}

impl Verification {
    /// The `verified` field of the response body: `null` when unconfigured.
    #[must_use]
    pub const fn as_bool(self) -> Option<bool> {
        match self {
            Self::Verified => Some(true),
            Self::Failed => Some(false),
            Self::NotConfigured => None,
        }
    }
}

/// Verify a webhook body against its claimed signature.
#[must_use]
pub fn verify_signature(
    secret: Option<&SecretString>,
    body: &[u8],
    provided_signature: &str,
) -> Verification {
    let Some(secret) = secret else {
        return Verification::NotConfigured;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()) else {
        return Verification::Failed;
    };
    mac.update(body);

    let expected = hex::encode(mac.finalize().into_bytes());

    if constant_time_compare(&expected, provided_signature) {
        Verification::Verified
    } else {
        Verification::Failed
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
