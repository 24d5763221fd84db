use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::error::DomainError;

type HmacSha256 = Hmac<Sha256>;

/// Verifies a hex-encoded HMAC-SHA256 digest over the raw request body.
/// The digest must be computed over the exact bytes received on the wire;
/// re-serializing the parsed body would break vendors that sign whitespace
/// or key order differently.
pub fn verify_hmac_sha256(raw_body: &[u8], provided: &str, secret: &str) -> Result<(), DomainError> {
    let trimmed = provided.trim();
    let digest_hex = trimmed.strip_prefix("sha256=").unwrap_or(trimmed);
    if digest_hex.is_empty() {
        return Err(DomainError::SignatureInvalid(
            "signature header is empty".to_owned(),
        ));
    }
    let provided_bytes = hex::decode(digest_hex).map_err(|_| {
        DomainError::SignatureInvalid("signature header is not valid hex".to_owned())
    })?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| {
        DomainError::Unavailable("webhook secret cannot key an hmac".to_owned())
    })?;
    mac.update(raw_body);
    let computed = mac.finalize().into_bytes();

    if computed.len() != provided_bytes.len() {
        // Burn a comparison anyway so a truncated digest costs the same.
        let _ = computed.ct_eq(&computed);
        return Err(DomainError::SignatureInvalid(
            "webhook signature mismatch".to_owned(),
        ));
    }
    if bool::from(computed.ct_eq(&provided_bytes)) {
        Ok(())
    } else {
        Err(DomainError::SignatureInvalid(
            "webhook signature mismatch".to_owned(),
        ))
    }
}

/// Subscription handshake check: the mode must be `subscribe` and the echoed
/// token must match the configured one.
pub fn verify_handshake(mode: Option<&str>, token: Option<&str>, expected: &str) -> bool {
    if mode.map(str::trim) != Some("subscribe") {
        return false;
    }
    let Some(token) = token.map(str::trim).filter(|value| !value.is_empty()) else {
        return false;
    };
    token.as_bytes().ct_eq(expected.as_bytes()).into()
}
