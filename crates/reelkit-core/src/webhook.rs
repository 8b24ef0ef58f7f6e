//! Inbound webhook signature verification.
//!
//! Signatures are hex-encoded HMAC-SHA256 digests of the raw request body.
//! Comparison goes through `Mac::verify_slice`, which is constant-time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::error::{CoreError, CoreResult};

type HmacSha256 = Hmac<Sha256>;

/// Verify a webhook signature against the raw payload.
///
/// A missing signature or missing secret always fails closed.
/// A `sha256=` prefix on the received signature is tolerated.
pub fn verify(payload: &[u8], signature: Option<&str>, secret: Option<&str>) -> bool {
    let (signature, secret) = match (signature, secret) {
        (Some(sig), Some(sec)) if !sig.is_empty() && !sec.is_empty() => (sig, sec),
        _ => return false,
    };

    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);

    let received = match hex::decode(signature) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);

    mac.verify_slice(&received).is_ok()
}

/// Compute the hex signature for an outbound payload.
pub fn sign(payload: &[u8], secret: &str) -> CoreResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| CoreError::internal("HMAC key setup failed"))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Like [`verify`] but signals `Unauthorized` on failure.
pub fn require(payload: &[u8], signature: Option<&str>, secret: Option<&str>) -> CoreResult<()> {
    if verify(payload, signature, secret) {
        Ok(())
    } else {
        warn!("Webhook signature verification failed");
        Err(CoreError::unauthorized("invalid webhook signature"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    #[test]
    fn test_valid_signature() {
        let payload = br#"{"event":"video.completed","id":"abc"}"#;
        let sig = sign(payload, SECRET).unwrap();
        assert!(verify(payload, Some(&sig), Some(SECRET)));
    }

    #[test]
    fn test_prefixed_signature() {
        let payload = b"body";
        let sig = format!("sha256={}", sign(payload, SECRET).unwrap());
        assert!(verify(payload, Some(&sig), Some(SECRET)));
    }

    #[test]
    fn test_payload_mutation_flips_result() {
        let payload = b"exact payload bytes";
        let sig = sign(payload, SECRET).unwrap();

        let mut mutated = payload.to_vec();
        for i in 0..mutated.len() {
            mutated[i] ^= 0x01;
            assert!(!verify(&mutated, Some(&sig), Some(SECRET)), "byte {i}");
            mutated[i] ^= 0x01;
        }
    }

    #[test]
    fn test_signature_mutation_flips_result() {
        let payload = b"payload";
        let sig = sign(payload, SECRET).unwrap();

        let mut chars: Vec<char> = sig.chars().collect();
        chars[0] = if chars[0] == '0' { '1' } else { '0' };
        let mutated: String = chars.into_iter().collect();

        assert!(!verify(payload, Some(&mutated), Some(SECRET)));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let payload = b"payload";
        let sig = sign(payload, SECRET).unwrap();
        assert!(!verify(payload, Some(&sig), Some("other_secret")));
    }

    #[test]
    fn test_missing_inputs_fail_closed() {
        let payload = b"payload";
        let sig = sign(payload, SECRET).unwrap();

        assert!(!verify(payload, None, Some(SECRET)));
        assert!(!verify(payload, Some(&sig), None));
        assert!(!verify(payload, Some(""), Some(SECRET)));
        assert!(!verify(payload, Some(&sig), Some("")));
        assert!(!verify(payload, Some("zzzz-not-hex"), Some(SECRET)));
    }

    #[test]
    fn test_require_maps_to_unauthorized() {
        let payload = b"payload";
        let sig = sign(payload, SECRET).unwrap();

        assert!(require(payload, Some(&sig), Some(SECRET)).is_ok());
        assert!(matches!(
            require(payload, None, Some(SECRET)),
            Err(CoreError::Unauthorized(_))
        ));
    }
}
