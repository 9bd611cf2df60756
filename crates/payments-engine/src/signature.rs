//! Webhook Signature Verification
//!
//! Authenticates processor webhooks with HMAC-SHA256 over
//! `"{timestamp}.{raw body}"`, compared in constant time, with a timestamp
//! window against replays.
//!
//! The verifier takes the body as the exact bytes received and is the only
//! place a [`WebhookEvent`] can be constructed, so nothing can reconcile an
//! event that was parsed (or re-serialised) before verification.

use std::time::Duration;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{PaymentError, Result};
use crate::webhook::WebhookEvent;

type HmacSha256 = Hmac<Sha256>;

/// Header the processor puts the signature in
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Why a webhook was rejected. Logged, never returned to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RejectReason {
    MissingSecret,
    MalformedHeader,
    TimestampOutOfTolerance,
    SignatureMismatch,
    MalformedPayload,
}

/// Parsed `t=<timestamp>,v1=<sig>[,v1=<sig>...]` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,

    /// Every v1 signature present (several during secret rotation)
    pub signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// Parse a signature header. Unknown keys (e.g. legacy `v0`) are ignored.
    pub fn parse(header: &str) -> Option<Self> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part.trim().split_once('=')?;

            match key {
                "t" => timestamp = Some(value.parse().ok()?),
                "v1" => signatures.push(hex::decode(value).ok()?),
                _ => {}
            }
        }

        if signatures.is_empty() {
            return None;
        }

        Some(Self {
            timestamp: timestamp?,
            signatures,
        })
    }
}

/// Verifier for processor webhook signatures
pub struct SignatureVerifier {
    /// None when no webhook secret is configured: everything is rejected
    secret: Option<SecretString>,

    tolerance: Duration,
}

impl SignatureVerifier {
    pub fn new(secret: Option<SecretString>, tolerance: Duration) -> Self {
        Self { secret, tolerance }
    }

    /// Whether a shared secret is configured at all
    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Verify against the current clock and parse the event
    pub fn verify(&self, payload: &[u8], signature_header: &str) -> Result<WebhookEvent> {
        self.verify_at(payload, signature_header, chrono::Utc::now().timestamp())
    }

    /// Verify against an explicit clock reading (unix seconds).
    ///
    /// Every failure collapses to `PaymentError::Verification`.
    pub fn verify_at(&self, payload: &[u8], signature_header: &str, now: i64) -> Result<WebhookEvent> {
        self.check(payload, signature_header, now).map_err(|reason| {
            tracing::warn!(reason = ?reason, "Webhook verification failed");
            PaymentError::Verification
        })
    }

    fn check(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: i64,
    ) -> std::result::Result<WebhookEvent, RejectReason> {
        let secret = self.secret.as_ref().ok_or(RejectReason::MissingSecret)?;
        let header = SignatureHeader::parse(signature_header).ok_or(RejectReason::MalformedHeader)?;

        if now.abs_diff(header.timestamp) > self.tolerance.as_secs() {
            return Err(RejectReason::TimestampOutOfTolerance);
        }

        let expected = compute_signature(secret.expose_secret(), header.timestamp, payload)
            .map_err(|_| RejectReason::MissingSecret)?;
        let matched = header
            .signatures
            .iter()
            .any(|candidate| bool::from(expected.as_slice().ct_eq(candidate.as_slice())));

        if !matched {
            return Err(RejectReason::SignatureMismatch);
        }

        // Only now, after authenticating the exact bytes, is the body parsed
        let event = WebhookEvent::from_verified_slice(payload)
            .map_err(|_| RejectReason::MalformedPayload)?;

        tracing::debug!(
            event_id = %event.id(),
            event_type = %event.event_type(),
            "Webhook signature verified"
        );

        Ok(event)
    }
}

/// HMAC-SHA256 over `"{timestamp}.{payload}"`, fed the raw bytes directly
fn compute_signature(
    secret: &str,
    timestamp: i64,
    payload: &[u8],
) -> std::result::Result<Vec<u8>, hmac::digest::InvalidLength> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Build a signature header the way the processor does.
///
/// Useful for local tooling that replays webhooks, and for tests.
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String> {
    let signature = compute_signature(secret, timestamp, payload)
        .map_err(|_| PaymentError::Config("invalid webhook secret".into()))?;
    Ok(format!("t={timestamp},v1={}", hex::encode(signature)))
}
