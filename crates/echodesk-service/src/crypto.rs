//! Cryptographic utilities for webhook verification and signed values.
//!
//! - Stripe: `Stripe-Signature` header, HMAC-SHA256 over `{t}.{payload}`
//! - Twilio: `X-Twilio-Signature` header, base64 HMAC-SHA1 over the URL and sorted form fields
//! - OAuth `state`: HMAC-SHA256 tag appended to the payload
//! - Prompt hashes: plain SHA-256

use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;
type HmacSha1 = Hmac<Sha1>;

/// Maximum age (either direction) of a Stripe signature timestamp.
pub const STRIPE_SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Why a signature was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// Header had no `t=` element.
    #[error("missing timestamp")]
    MissingTimestamp,

    /// Header had no `v1=` element.
    #[error("missing signature")]
    MissingSignature,

    /// Timestamp is outside the tolerance window.
    #[error("timestamp outside tolerance ({age}s)")]
    Expired {
        /// Seconds between the signature and now.
        age: i64,
    },

    /// No signature matched.
    #[error("signature mismatch")]
    Mismatch,
}

/// Compute HMAC-SHA256 and return hex-encoded result.
///
/// # Panics
///
/// This function will never panic in practice. The `expect` call is guarded by
/// the invariant that HMAC-SHA256 accepts keys of any size per RFC 2104.
#[must_use]
pub fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    // INVARIANT: HMAC accepts keys of any size per RFC 2104.
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC-SHA256 accepts any key size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Hex-encoded SHA-256 digest.
#[must_use]
pub fn sha256_hex(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

/// Constant-time string comparison to prevent timing attacks.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

// ============================================================================
// Stripe
// ============================================================================

/// Verify a `Stripe-Signature` header against the raw request body.
///
/// Header format: `t=timestamp,v1=signature[,v1=signature2...]`.
///
/// # Errors
///
/// Returns a [`SignatureError`] describing the first check that failed.
pub fn verify_stripe_signature(
    secret: &str,
    payload: &str,
    header: &str,
    now_unix: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        let mut kv = part.trim().splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(ts)) => timestamp = Some(ts),
            (Some("v1"), Some(sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    if signatures.is_empty() {
        return Err(SignatureError::MissingSignature);
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::MissingTimestamp)?;
    let age = (now_unix - ts).abs();
    if age > STRIPE_SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::Expired { age });
    }

    let expected = hmac_sha256_hex(secret, &format!("{timestamp}.{payload}"));
    if signatures.iter().any(|sig| constant_time_eq(&expected, sig)) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Build a `Stripe-Signature` header value.
#[must_use]
pub fn stripe_signature_header(secret: &str, payload: &str, timestamp: i64) -> String {
    let sig = hmac_sha256_hex(secret, &format!("{timestamp}.{payload}"));
    format!("t={timestamp},v1={sig}")
}

// ============================================================================
// Twilio
// ============================================================================

/// Compute the `X-Twilio-Signature` for a webhook request.
///
/// The signed string is the full URL followed by every form field as
/// `key` + `value`, sorted by key.
///
/// # Panics
///
/// Never in practice: HMAC-SHA1 accepts keys of any size.
#[must_use]
pub fn twilio_signature(auth_token: &str, url: &str, params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let mut data = url.to_string();
    for (key, value) in sorted {
        data.push_str(key);
        data.push_str(value);
    }

    // INVARIANT: HMAC accepts keys of any size per RFC 2104.
    let mut mac =
        HmacSha1::new_from_slice(auth_token.as_bytes()).expect("HMAC-SHA1 accepts any key size");
    mac.update(data.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Check an `X-Twilio-Signature` header.
#[must_use]
pub fn verify_twilio_signature(
    auth_token: &str,
    url: &str,
    params: &[(String, String)],
    signature: &str,
) -> bool {
    constant_time_eq(&twilio_signature(auth_token, url, params), signature)
}

// ============================================================================
// Signed values (OAuth state)
// ============================================================================

/// Append an HMAC tag to `payload`: `{payload}.{hex}`.
#[must_use]
pub fn sign_value(secret: &str, payload: &str) -> String {
    format!("{payload}.{}", hmac_sha256_hex(secret, payload))
}

/// Return the payload of a value produced by [`sign_value`] if its tag is valid.
#[must_use]
pub fn verify_signed_value<'a>(secret: &str, signed: &'a str) -> Option<&'a str> {
    let (payload, tag) = signed.rsplit_once('.')?;
    constant_time_eq(&hmac_sha256_hex(secret, payload), tag).then_some(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_sha256_produces_correct_length() {
        let result = hmac_sha256_hex("key", "The quick brown fox jumps over the lazy dog");
        assert_eq!(result.len(), 64);
    }

    #[test]
    fn hmac_sha256_matches_known_vector() {
        assert_eq!(
            hmac_sha256_hex("key", "The quick brown fox jumps over the lazy dog"),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn sha256_matches_known_vector() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn constant_time_eq_works() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(constant_time_eq("", ""));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "ab"));
        assert!(!constant_time_eq("abc", "ABC"));
    }

    #[test]
    fn stripe_signature_roundtrip() {
        let header = stripe_signature_header("whsec_test", r#"{"id":"evt_1"}"#, 1_700_000_000);
        assert_eq!(
            verify_stripe_signature("whsec_test", r#"{"id":"evt_1"}"#, &header, 1_700_000_100),
            Ok(())
        );
    }

    #[test]
    fn stripe_signature_rejects_tampered_body() {
        let header = stripe_signature_header("whsec_test", "original", 1_700_000_000);
        assert_eq!(
            verify_stripe_signature("whsec_test", "tampered", &header, 1_700_000_000),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn stripe_signature_rejects_stale_timestamp() {
        let header = stripe_signature_header("whsec_test", "body", 1_700_000_000);
        assert_eq!(
            verify_stripe_signature("whsec_test", "body", &header, 1_700_000_301),
            Err(SignatureError::Expired { age: 301 })
        );
    }

    #[test]
    fn stripe_signature_accepts_any_matching_v1() {
        let good = hmac_sha256_hex("whsec_test", "10.body");
        let header = format!("t=10,v1=deadbeef,v1={good}");
        assert_eq!(verify_stripe_signature("whsec_test", "body", &header, 10), Ok(()));
    }

    #[test]
    fn stripe_signature_requires_parts() {
        assert_eq!(
            verify_stripe_signature("s", "b", "v1=abc", 0),
            Err(SignatureError::MissingTimestamp)
        );
        assert_eq!(
            verify_stripe_signature("s", "b", "t=0", 0),
            Err(SignatureError::MissingSignature)
        );
    }

    #[test]
    fn twilio_signature_ignores_param_order() {
        let a = vec![
            ("To".to_string(), "+15550001111".to_string()),
            ("CallSid".to_string(), "CA123".to_string()),
        ];
        let mut b = a.clone();
        b.reverse();
        let url = "https://example.com/webhooks/twilio/voice";
        assert_eq!(twilio_signature("tok", url, &a), twilio_signature("tok", url, &b));
        assert!(verify_twilio_signature("tok", url, &b, &twilio_signature("tok", url, &a)));
        assert!(!verify_twilio_signature("other", url, &a, &twilio_signature("tok", url, &a)));
    }

    #[test]
    fn signed_values_verify_and_reject_tampering() {
        let signed = sign_value("secret", "user-1:onboarding");
        assert_eq!(verify_signed_value("secret", &signed), Some("user-1:onboarding"));

        let tampered = signed.replacen("user-1", "user-2", 1);
        assert_eq!(verify_signed_value("secret", &tampered), None);
        assert_eq!(verify_signed_value("secret", "no-tag"), None);
    }
}
