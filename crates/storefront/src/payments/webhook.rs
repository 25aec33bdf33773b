//! Inbound webhook verification and event parsing.
//!
//! Events arrive signed: the `Payment-Signature` header carries
//! `t=<unix-seconds>,v1=<base64 hmac-sha256>` where the MAC is computed
//! over `"{t}.{body}"` with the shared webhook secret. Verification runs
//! strictly before any event is acted on; the timestamp bound limits
//! replay of captured deliveries.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

use stride_core::Identity;

use super::types::SessionMetadata;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the event signature.
pub const SIGNATURE_HEADER: &str = "Payment-Signature";

/// Default accepted clock skew between the provider and us, in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Errors from webhook verification and parsing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The signature header is missing a part or otherwise malformed.
    #[error("missing or malformed signature header")]
    MalformedHeader,

    /// The signature does not match the payload.
    #[error("signature mismatch")]
    SignatureMismatch,

    /// The signed timestamp is outside the accepted skew.
    #[error("signature timestamp outside tolerance")]
    StaleTimestamp,

    /// The payload is not a well-formed event.
    #[error("malformed event payload: {0}")]
    MalformedPayload(String),
}

/// Verify a signature header against the raw request body.
///
/// `now` is the verifier's current unix time; injected so the tolerance
/// window is testable.
///
/// # Errors
///
/// Returns [`WebhookError::MalformedHeader`] when the header cannot be
/// parsed, [`WebhookError::StaleTimestamp`] when the signed timestamp is
/// outside `tolerance_secs` of `now`, and
/// [`WebhookError::SignatureMismatch`] when the MAC does not verify.
pub fn verify_signature(
    secret: &[u8],
    header: &str,
    body: &[u8],
    now: i64,
    tolerance_secs: i64,
) -> Result<(), WebhookError> {
    let (timestamp, signature) = parse_signature_header(header)?;

    if (now - timestamp).abs() > tolerance_secs {
        return Err(WebhookError::StaleTimestamp);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| WebhookError::SignatureMismatch)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);

    // verify_slice is constant-time
    mac.verify_slice(&signature)
        .map_err(|_| WebhookError::SignatureMismatch)
}

/// Sign a payload the way the provider does.
///
/// Used by tests and local tooling to fabricate valid deliveries.
#[must_use]
pub fn sign_payload(secret: &[u8], body: &[u8], timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret)
        .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    let signature = BASE64.encode(mac.finalize().into_bytes());

    format!("t={timestamp},v1={signature}")
}

fn parse_signature_header(header: &str) -> Result<(i64, Vec<u8>), WebhookError> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            return Err(WebhookError::MalformedHeader);
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => signature = BASE64.decode(value).ok(),
            _ => {}
        }
    }

    match (timestamp, signature) {
        (Some(t), Some(sig)) => Ok((t, sig)),
        _ => Err(WebhookError::MalformedHeader),
    }
}

// =============================================================================
// Events
// =============================================================================

/// A verified "checkout completed" event, ready for order materialization.
#[derive(Debug, Clone)]
pub struct CompletedCheckout {
    /// The provider's session id - the order idempotency key.
    pub session_id: String,
    /// The cart owner, recovered from session metadata.
    pub owner: Identity,
}

/// Payment provider events this service reacts to.
#[derive(Debug, Clone)]
pub enum PaymentEvent {
    /// The customer completed payment; materialize an order.
    CheckoutCompleted(CompletedCheckout),
    /// Payment failed. Logged only; no state change.
    PaymentFailed {
        /// The provider's session id.
        session_id: String,
    },
    /// An event kind this service does not handle.
    Unhandled {
        /// The provider's event type string.
        kind: String,
    },
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: RawSession,
}

#[derive(Debug, Deserialize)]
struct RawSession {
    id: String,
    #[serde(default)]
    metadata: SessionMetadata,
}

/// Parse a verified payload into a [`PaymentEvent`].
///
/// # Errors
///
/// Returns [`WebhookError::MalformedPayload`] when the body is not valid
/// event JSON, or when a completed-checkout event carries no usable cart
/// owner in its metadata.
pub fn parse_event(body: &[u8]) -> Result<PaymentEvent, WebhookError> {
    let raw: RawEvent = serde_json::from_slice(body)
        .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

    match raw.kind.as_str() {
        "checkout.session.completed" => {
            let session = raw.data.object;
            let owner = session.metadata.identity().ok_or_else(|| {
                WebhookError::MalformedPayload(format!(
                    "completed session {} carries no cart owner",
                    session.id
                ))
            })?;

            Ok(PaymentEvent::CheckoutCompleted(CompletedCheckout {
                session_id: session.id,
                owner,
            }))
        }
        "payment_intent.payment_failed" => Ok(PaymentEvent::PaymentFailed {
            session_id: raw.data.object.id,
        }),
        _ => Ok(PaymentEvent::Unhandled { kind: raw.kind }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stride_core::UserId;

    use super::*;

    const SECRET: &[u8] = b"whsec_3kP9vR2mQ8xT5nL7jD4fH6gB1cW0yZ";

    #[test]
    fn test_valid_signature_verifies() {
        let body = br#"{"type":"noop"}"#;
        let header = sign_payload(SECRET, body, 1_700_000_000);

        assert!(verify_signature(SECRET, &header, body, 1_700_000_030, 300).is_ok());
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let header = sign_payload(SECRET, br#"{"amount":1}"#, 1_700_000_000);

        let result = verify_signature(SECRET, &header, br#"{"amount":9}"#, 1_700_000_000, 300);
        assert!(matches!(result, Err(WebhookError::SignatureMismatch)));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let body = br#"{"type":"noop"}"#;
        let header = sign_payload(b"whsec_other", body, 1_700_000_000);

        let result = verify_signature(SECRET, &header, body, 1_700_000_000, 300);
        assert!(matches!(result, Err(WebhookError::SignatureMismatch)));
    }

    #[test]
    fn test_stale_timestamp_is_rejected() {
        let body = br#"{"type":"noop"}"#;
        let header = sign_payload(SECRET, body, 1_700_000_000);

        let result = verify_signature(SECRET, &header, body, 1_700_000_000 + 301, 300);
        assert!(matches!(result, Err(WebhookError::StaleTimestamp)));
    }

    #[test]
    fn test_malformed_header_is_rejected() {
        let body = b"{}";
        for header in ["", "t=abc,v1=zzz", "v1=only", "t=123"] {
            let result = verify_signature(SECRET, header, body, 0, 300);
            assert!(
                matches!(result, Err(WebhookError::MalformedHeader)),
                "header {header:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_parse_completed_event_with_user_owner() {
        let user_id = UserId::generate();
        let body = format!(
            r#"{{"type":"checkout.session.completed","data":{{"object":{{"id":"cs_123","metadata":{{"user_id":"{user_id}"}}}}}}}}"#
        );

        let event = parse_event(body.as_bytes()).unwrap();
        let PaymentEvent::CheckoutCompleted(completed) = event else {
            panic!("expected completed checkout");
        };
        assert_eq!(completed.session_id, "cs_123");
        assert_eq!(completed.owner.user_id(), Some(user_id));
    }

    #[test]
    fn test_parse_completed_event_with_guest_owner() {
        let body = r#"{"type":"checkout.session.completed","data":{"object":{"id":"cs_456","metadata":{"guest_token":"g-abc123"}}}}"#;

        let event = parse_event(body.as_bytes()).unwrap();
        let PaymentEvent::CheckoutCompleted(completed) = event else {
            panic!("expected completed checkout");
        };
        assert_eq!(
            completed.owner.guest_token().map(|t| t.as_str()),
            Some("g-abc123")
        );
    }

    #[test]
    fn test_completed_event_without_owner_is_malformed() {
        let body = r#"{"type":"checkout.session.completed","data":{"object":{"id":"cs_789"}}}"#;
        assert!(matches!(
            parse_event(body.as_bytes()),
            Err(WebhookError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_parse_failed_and_unhandled_events() {
        let failed = r#"{"type":"payment_intent.payment_failed","data":{"object":{"id":"cs_x"}}}"#;
        assert!(matches!(
            parse_event(failed.as_bytes()).unwrap(),
            PaymentEvent::PaymentFailed { .. }
        ));

        let other = r#"{"type":"charge.refunded","data":{"object":{"id":"ch_1"}}}"#;
        assert!(matches!(
            parse_event(other.as_bytes()).unwrap(),
            PaymentEvent::Unhandled { .. }
        ));
    }
}
