//! HMAC-SHA256 verification for provider webhook signatures.
//!
//! The provider signs each delivery with a shared secret using the scheme:
//! - Header: `Stripe-Signature: t=<unix-seconds>,v1=<hex-hmac>[,v1=<hex-hmac>...]`
//! - Signature is computed over: `{timestamp}.{raw body}`
//! - The signature is hex-encoded HMAC-SHA256
//!
//! Multiple `v1` entries may appear during secret rotation; verification
//! succeeds if any of them matches. The signed timestamp must fall within a
//! configured tolerance window of the current time to limit replay.

use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::errors::Error;
use crate::webhooks::events::WebhookEvent;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature, lowercase for axum `HeaderMap` lookups.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Compute the hex HMAC-SHA256 over `{timestamp}.{payload}`.
fn compute_signature(timestamp: i64, payload: &str, secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Sign a payload the way the provider would.
///
/// Used by tests and the synthetic test trigger; returns the full header
/// value `t={timestamp},v1={hex-hmac}`.
pub fn sign_payload(timestamp: i64, payload: &str, secret: &str) -> Option<String> {
    let signature = compute_signature(timestamp, payload, secret)?;
    Some(format!("t={timestamp},v1={signature}"))
}

/// Parsed `Stripe-Signature` header value.
struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

fn parse_header(header: &str) -> Option<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let (key, value) = part.trim().split_once('=')?;
        match key {
            "t" => timestamp = Some(value.parse::<i64>().ok()?),
            "v1" => signatures.push(value.to_string()),
            // Unknown schemes (e.g. v0 test-mode signatures) are ignored
            _ => {}
        }
    }

    if signatures.is_empty() {
        return None;
    }

    Some(SignatureHeader {
        timestamp: timestamp?,
        signatures,
    })
}

/// Verify a signature header against the raw body at a given point in time.
///
/// Returns the failure reason on rejection. Split out from
/// [`construct_event`] so tests can pin `now`.
fn verify_at(payload: &str, header: &str, secret: &str, tolerance: Duration, now: i64) -> Result<(), String> {
    if secret.is_empty() {
        return Err("no webhook secret configured".to_string());
    }

    let Some(parsed) = parse_header(header) else {
        return Err("malformed signature header".to_string());
    };

    // Reject both stale and future-dated timestamps. The timestamp is
    // attacker-controlled, so the subtraction must not overflow.
    let skew = now.checked_sub(parsed.timestamp).map(i64::unsigned_abs);
    if skew.is_none_or(|s| s > tolerance.as_secs()) {
        return Err("timestamp outside tolerance window".to_string());
    }

    let Some(expected) = compute_signature(parsed.timestamp, payload, secret) else {
        return Err("invalid signing secret".to_string());
    };

    let matched = parsed
        .signatures
        .iter()
        .any(|candidate| constant_time_eq(candidate.as_bytes(), expected.as_bytes()));

    if matched {
        Ok(())
    } else {
        Err("signature mismatch".to_string())
    }
}

/// Verify a webhook delivery and parse it into a trusted [`WebhookEvent`].
///
/// The body is never inspected before the signature checks out. Verification
/// failures surface as [`Error::SignatureVerification`]; a validly signed but
/// unparseable body is a [`Error::BadRequest`].
pub fn construct_event(payload: &str, header: &str, secret: &str, tolerance: Duration) -> Result<WebhookEvent, Error> {
    verify_at(payload, header, secret, tolerance, Utc::now().timestamp())
        .map_err(|reason| Error::SignatureVerification { reason })?;

    serde_json::from_str(payload).map_err(|e| Error::BadRequest {
        message: format!("invalid event payload: {e}"),
    })
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";
    const TOLERANCE: Duration = Duration::from_secs(300);

    #[test]
    fn test_sign_and_verify() {
        let payload = r#"{"type":"charge.failed","data":{"object":{"id":"ch_1"}}}"#;
        let timestamp = 1614265330;

        let header = sign_payload(timestamp, payload, SECRET).expect("should sign");
        assert!(header.starts_with(&format!("t={timestamp},v1=")));

        assert!(verify_at(payload, &header, SECRET, TOLERANCE, timestamp).is_ok());

        // Any body mutation invalidates the signature
        let mutated = payload.replace("ch_1", "ch_2");
        assert!(verify_at(&mutated, &header, SECRET, TOLERANCE, timestamp).is_err());

        // Wrong secret fails
        assert!(verify_at(payload, &header, "whsec_other", TOLERANCE, timestamp).is_err());
    }

    #[test]
    fn test_signature_is_deterministic() {
        let a = sign_payload(1614265330, r#"{"test": 2432232314}"#, SECRET).unwrap();
        let b = sign_payload(1614265330, r#"{"test": 2432232314}"#, SECRET).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tolerance_window() {
        let payload = "{}";
        let timestamp = 1_700_000_000;
        let header = sign_payload(timestamp, payload, SECRET).unwrap();

        // Inside the window, both directions
        assert!(verify_at(payload, &header, SECRET, TOLERANCE, timestamp + 299).is_ok());
        assert!(verify_at(payload, &header, SECRET, TOLERANCE, timestamp - 299).is_ok());

        // Stale delivery
        let err = verify_at(payload, &header, SECRET, TOLERANCE, timestamp + 301).unwrap_err();
        assert!(err.contains("tolerance"));

        // Future-dated delivery
        assert!(verify_at(payload, &header, SECRET, TOLERANCE, timestamp - 301).is_err());
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        // Timestamps at the integer extremes must be rejected as out of
        // tolerance, not overflow the skew computation
        let now = 1_700_000_000;
        for timestamp in [i64::MIN, i64::MAX] {
            let header = format!("t={timestamp},v1={}", "0".repeat(64));
            let err = verify_at("{}", &header, SECRET, TOLERANCE, now).unwrap_err();
            assert!(err.contains("tolerance"), "t={timestamp} should be out of tolerance");
        }
    }

    #[test]
    fn test_multiple_v1_signatures_for_rotation() {
        let payload = "{}";
        let timestamp = 1_700_000_000;
        let good = compute_signature(timestamp, payload, SECRET).unwrap();
        let header = format!("t={timestamp},v1={},v1={good}", "0".repeat(64));

        assert!(verify_at(payload, &header, SECRET, TOLERANCE, timestamp).is_ok());
    }

    #[test]
    fn test_malformed_headers() {
        let timestamp = 1_700_000_000;
        for header in [
            "",
            "garbage",
            "t=notanumber,v1=abc",
            "t=1700000000",         // no v1
            "v1=abcdef",            // no timestamp
            "t=1700000000,v0=abcd", // unknown scheme only
        ] {
            assert!(
                verify_at("{}", header, SECRET, TOLERANCE, timestamp).is_err(),
                "header {header:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_construct_event_parses_type_tag() {
        let payload = r#"{"id":"evt_1","type":"charge.failed","data":{"object":{"id":"ch_1","amount":2999,"currency":"usd"}}}"#;
        let timestamp = Utc::now().timestamp();
        let header = sign_payload(timestamp, payload, SECRET).unwrap();

        let event = construct_event(payload, &header, SECRET, TOLERANCE).expect("should verify");
        assert_eq!(event.event_type, "charge.failed");
        assert_eq!(event.data.object["id"], "ch_1");
    }

    #[test]
    fn test_construct_event_rejects_bad_signature() {
        let payload = r#"{"type":"charge.failed"}"#;
        let header = format!("t={},v1={}", Utc::now().timestamp(), "0".repeat(64));

        let err = construct_event(payload, &header, SECRET, TOLERANCE).unwrap_err();
        assert!(matches!(err, Error::SignatureVerification { .. }));
    }

    #[test]
    fn test_construct_event_signed_garbage_is_bad_request() {
        let payload = "not json";
        let timestamp = Utc::now().timestamp();
        let header = sign_payload(timestamp, payload, SECRET).unwrap();

        let err = construct_event(payload, &header, SECRET, TOLERANCE).unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
    }
}
