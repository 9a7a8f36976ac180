//! Stripe webhook signature verification.
//!
//! Stripe signs each delivery with HMAC-SHA256 over `"{timestamp}.{body}"` and
//! sends the result in the `Stripe-Signature` header:
//! `t=1492774577,v1=5257a869e7ec...,v0=6ffbb59b2300...`.
//! Reference: https://docs.stripe.com/webhooks#verify-manually

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::warn;

use super::PaymentEvent;

type HmacSha256 = Hmac<Sha256>;

/// Name of the header carrying the signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("No signatures found matching the expected signature for payload")]
    NoMatchingSignature,

    #[error("Unable to extract timestamp and signatures from header")]
    MalformedHeader,

    #[error("Timestamp outside the tolerance zone")]
    TimestampOutsideTolerance,

    #[error("Invalid webhook secret")]
    InvalidSecret,

    #[error("Invalid event payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Verify `header` against `payload` and decode the event.
///
/// `tolerance_secs` bounds the difference between the signed timestamp and now.
pub fn construct_event(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: u64,
) -> Result<PaymentEvent, SignatureError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    construct_event_at(payload, header, secret, tolerance_secs, now)
}

pub(crate) fn construct_event_at(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: u64,
    now: i64,
) -> Result<PaymentEvent, SignatureError> {
    let (signed_at, signatures) = parse_header(header)?;
    let timestamp: i64 = signed_at.parse().map_err(|_| SignatureError::MalformedHeader)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(signed_at.as_bytes());
    mac.update(b".");
    mac.update(payload);

    // verify_slice compares in constant time.
    let matched = signatures
        .iter()
        .filter_map(|sig| hex::decode(sig).ok())
        .any(|sig| mac.clone().verify_slice(&sig).is_ok());

    if !matched {
        warn!(
            candidate_count = signatures.len(),
            "webhook_signature_mismatch"
        );
        return Err(SignatureError::NoMatchingSignature);
    }

    let age = now.abs_diff(timestamp);
    if age > tolerance_secs {
        warn!(
            webhook_time = timestamp,
            current_time = now,
            age_seconds = age,
            max_age_seconds = tolerance_secs,
            "webhook_signature_stale"
        );
        return Err(SignatureError::TimestampOutsideTolerance);
    }

    Ok(serde_json::from_slice(payload)?)
}

/// Split the header into its raw timestamp and `v1` signatures.
fn parse_header(header: &str) -> Result<(&str, Vec<&str>), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    match timestamp {
        Some(t) if !signatures.is_empty() => Ok((t, signatures)),
        _ => Err(SignatureError::MalformedHeader),
    }
}

/// Produce a `Stripe-Signature` header value for `payload`.
#[cfg(test)]
pub(crate) fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}
