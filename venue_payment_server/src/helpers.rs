use std::time::Duration;

use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Timestamps up to this far in the future are accepted to absorb clock skew.
const MAX_CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("The signature header is malformed")]
    MalformedHeader,
    #[error("The signature timestamp is outside the tolerance window")]
    StaleTimestamp,
    #[error("No signature matches the payload")]
    Mismatch,
    #[error("The signing secret cannot be used as an HMAC key")]
    InvalidKey,
}

/// The parts of a `Stripe-Signature` header: `t=<unix secs>,v1=<hex>[,v1=<hex>...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, SignatureError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", t)) => timestamp = Some(t.parse::<i64>().map_err(|_| SignatureError::MalformedHeader)?),
                Some(("v1", s)) => signatures.push(s.to_string()),
                // Other schemes (v0) are ignored
                _ => {},
            }
        }
        match timestamp {
            Some(timestamp) if !signatures.is_empty() => Ok(Self { timestamp, signatures }),
            _ => Err(SignatureError::MalformedHeader),
        }
    }
}

/// Computes the hex-encoded signature the processor sends for `payload` sent at `timestamp`.
pub fn calculate_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, SignatureError> {
    let mac = signed_payload_mac(secret, timestamp, payload)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks the signature header against the raw request body. `now` is the current unix time in seconds.
pub fn verify_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    tolerance: Duration,
    now: i64,
) -> Result<(), SignatureError> {
    let header = SignatureHeader::parse(header)?;
    let age = now.checked_sub(header.timestamp).ok_or(SignatureError::StaleTimestamp)?;
    if age > i64::try_from(tolerance.as_secs()).unwrap_or(i64::MAX) || age < -MAX_CLOCK_SKEW_SECS {
        debug!("🔐️ Signature timestamp is {age}s old. Tolerance is {}s", tolerance.as_secs());
        return Err(SignatureError::StaleTimestamp);
    }
    let mac = signed_payload_mac(secret, header.timestamp, payload)?;
    let matched = header.signatures.iter().any(|candidate| {
        let Ok(candidate) = hex::decode(candidate) else {
            return false;
        };
        mac.clone().verify_slice(&candidate).is_ok()
    });
    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

fn signed_payload_mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}
