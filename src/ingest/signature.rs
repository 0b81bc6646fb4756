//! Webhook signature verification
//!
//! Processor webhooks carry a header of the form
//!
//! ```text
//! t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]
//! ```
//!
//! where each `v1` value is an HMAC-SHA256 of `"<t>.<raw body>"` keyed with the
//! endpoint secret. Several `v1` values may be present while a secret is being
//! rolled; any one matching is enough. Deliveries whose timestamp is further
//! from the current time than the tolerance are rejected to limit replay.

use crate::types::RefundError;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Default accepted clock distance between sender and receiver
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// HMAC-SHA256 webhook verifier
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Vec<u8>,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"<redacted>")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<Vec<u8>>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    /// Build the signature header a sender would attach to `payload`
    pub fn sign(&self, timestamp: i64, payload: &[u8]) -> Result<String, RefundError> {
        let mac = self.mac(timestamp, payload)?;
        Ok(format!(
            "t={},v1={}",
            timestamp,
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    /// Check `header` against `payload` at time `now`
    ///
    /// # Errors
    ///
    /// `RefundError::SignatureInvalid` if the header is malformed, the
    /// timestamp is outside the tolerance or no signature matches.
    pub fn verify(&self, header: &str, payload: &[u8], now: DateTime<Utc>) -> Result<(), RefundError> {
        let (timestamp, signatures) = parse_header(header)?;

        let tolerance = u64::try_from(self.tolerance_secs).unwrap_or(0);
        if now.timestamp().abs_diff(timestamp) > tolerance {
            warn!(timestamp, "webhook timestamp outside tolerance");
            return Err(RefundError::signature_invalid(
                "timestamp outside tolerance",
            ));
        }

        for signature in signatures {
            let Ok(expected) = hex::decode(signature) else {
                continue;
            };
            // Constant-time comparison
            if self.mac(timestamp, payload)?.verify_slice(&expected).is_ok() {
                return Ok(());
            }
        }

        warn!("webhook signature mismatch");
        Err(RefundError::signature_invalid("no matching signature"))
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, RefundError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| RefundError::signature_invalid("unusable secret"))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}

fn parse_header(header: &str) -> Result<(i64, Vec<&str>), RefundError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                let parsed = value
                    .parse::<i64>()
                    .map_err(|_| RefundError::signature_invalid("malformed timestamp"))?;
                timestamp = Some(parsed);
            }
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| RefundError::signature_invalid("missing timestamp"))?;
    if signatures.is_empty() {
        return Err(RefundError::signature_invalid("missing v1 signature"));
    }
    Ok((timestamp, signatures))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    const BODY: &[u8] = br#"{"id":"evt_1"}"#;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new("whsec_test", DEFAULT_TOLERANCE_SECS)
    }

    fn at(timestamp: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(timestamp, 0).unwrap()
    }

    #[test]
    fn test_signed_payload_verifies() {
        let header = verifier().sign(1_700_000_000, BODY).unwrap();
        assert!(verifier().verify(&header, BODY, at(1_700_000_010)).is_ok());
    }

    #[test]
    fn test_any_matching_signature_is_accepted() {
        let good = verifier().sign(1_700_000_000, BODY).unwrap();
        let good_sig = good.split_once(",v1=").unwrap().1;
        let header = format!("t=1700000000,v1={},v1={}", "00".repeat(32), good_sig);

        assert!(verifier().verify(&header, BODY, at(1_700_000_000)).is_ok());
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let header = verifier().sign(1_700_000_000, BODY).unwrap();
        let result = verifier().verify(&header, br#"{"id":"evt_2"}"#, at(1_700_000_000));
        assert_eq!(
            result,
            Err(RefundError::signature_invalid("no matching signature"))
        );
    }

    #[test]
    fn test_other_secret_is_rejected() {
        let header = WebhookVerifier::new("whsec_other", 300)
            .sign(1_700_000_000, BODY)
            .unwrap();
        assert!(verifier().verify(&header, BODY, at(1_700_000_000)).is_err());
    }

    #[rstest]
    #[case::too_old(1_700_000_000 + DEFAULT_TOLERANCE_SECS + 1)]
    #[case::from_the_future(1_700_000_000 - DEFAULT_TOLERANCE_SECS - 1)]
    fn test_stale_timestamp_is_rejected(#[case] now: i64) {
        let header = verifier().sign(1_700_000_000, BODY).unwrap();
        assert_eq!(
            verifier().verify(&header, BODY, at(now)),
            Err(RefundError::signature_invalid("timestamp outside tolerance"))
        );
    }

    #[rstest]
    #[case::min_timestamp(i64::MIN)]
    #[case::max_timestamp(i64::MAX)]
    fn test_extreme_timestamps_are_rejected(#[case] timestamp: i64) {
        let header = format!("t={},v1={}", timestamp, "aa".repeat(32));
        assert_eq!(
            verifier().verify(&header, BODY, at(1_700_000_000)),
            Err(RefundError::signature_invalid("timestamp outside tolerance"))
        );
    }

    #[rstest]
    #[case::empty("", "missing timestamp")]
    #[case::no_signature("t=1700000000", "missing v1 signature")]
    #[case::bad_timestamp("t=soon,v1=abcd", "malformed timestamp")]
    #[case::not_hex("t=1700000000,v1=zz", "no matching signature")]
    fn test_malformed_headers(#[case] header: &str, #[case] reason: &str) {
        assert_eq!(
            verifier().verify(header, BODY, at(1_700_000_000)),
            Err(RefundError::signature_invalid(reason))
        );
    }
}
