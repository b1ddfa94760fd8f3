//! Webhook body signature verification.
//!
//! The sender signs the raw request body with HMAC-SHA256 using the shared
//! webhook secret and puts the hex digest in the signature header. A
//! `sha256=` prefix on the header value is tolerated.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Outcome of a signature check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    Valid,
    Missing,
    Invalid,
}

impl SignatureCheck {
    pub fn is_valid(self) -> bool {
        self == SignatureCheck::Valid
    }
}

/// Compute the hex HMAC-SHA256 signature of `body` under `secret`.
#[cfg(test)]
pub(crate) fn sign_body(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a webhook body signature.
///
/// # Arguments
///
/// * `secret` - The shared webhook secret
/// * `body` - The raw request body, exactly as received
/// * `provided` - The signature header value, if the header was present
///
/// The comparison runs in constant time over the decoded digest.
pub fn verify_signature(secret: &str, body: &[u8], provided: Option<&str>) -> SignatureCheck {
    let provided = match provided.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return SignatureCheck::Missing,
    };

    let hex_sig = provided.strip_prefix("sha256=").unwrap_or(provided);

    let Ok(expected) = hex::decode(hex_sig) else {
        warn!(signature_length = hex_sig.len(), "webhook_signature_not_hex");
        return SignatureCheck::Invalid;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        warn!("webhook_signature_invalid_key");
        return SignatureCheck::Invalid;
    };
    mac.update(body);

    match mac.verify_slice(&expected) {
        Ok(()) => SignatureCheck::Valid,
        Err(_) => {
            warn!(
                body_length = body.len(),
                signature_length = expected.len(),
                "webhook_signature_mismatch"
            );
            SignatureCheck::Invalid
        }
    }
}
