//! # Stripe Webhook Verification
//!
//! `Stripe-Signature: t=<unix>,v1=<hex hmac>[,v1=...]`. The HMAC-SHA256 is
//! computed over `"<t>.<raw body>"` with the endpoint's `whsec_` secret.
//! The payload is not parsed until a signature matches.

use crate::client::PROVIDER;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use ski_core::{BookingError, BookingResult, CheckoutCompleted, Money, WebhookEvent};
use std::collections::HashMap;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Events to enable on the Stripe webhook endpoint. Both complete a hosted
/// checkout; everything else decodes to `WebhookEvent::Unknown`.
pub const CHECKOUT_COMPLETED_EVENTS: &[&str] = &[
    "checkout.session.completed",
    "checkout.session.async_payment_succeeded",
];

#[derive(Debug, PartialEq, Eq)]
struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

fn parse_signature_header(header: &str) -> BookingResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => signatures.push(value.to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        BookingError::InvalidSignature("Missing timestamp in signature".to_string())
    })?;

    if signatures.is_empty() {
        return Err(BookingError::InvalidSignature(
            "No v1 signature found".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

fn mac_for(secret: &str, timestamp: i64, payload: &[u8]) -> BookingResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BookingError::Configuration(format!("webhook secret: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Check `header` against `payload` at time `now` (unix seconds).
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> BookingResult<()> {
    let parsed = parse_signature_header(header)?;

    if (now - parsed.timestamp).abs() > tolerance_secs {
        return Err(BookingError::InvalidSignature(
            "Timestamp outside tolerance".to_string(),
        ));
    }

    let mac = mac_for(secret, parsed.timestamp, payload)?;
    let valid = parsed.signatures.iter().any(|sig| {
        hex::decode(sig)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });

    if !valid {
        return Err(BookingError::InvalidSignature(
            "Signature mismatch".to_string(),
        ));
    }
    Ok(())
}

/// Build a `Stripe-Signature` header value, as the Stripe CLI would.
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> BookingResult<String> {
    let mac = mac_for(secret, timestamp, payload)?;
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SessionObject {
    id: String,
    #[serde(default)]
    payment_intent: Option<String>,
    #[serde(default)]
    customer: Option<String>,
    #[serde(default)]
    customer_email: Option<String>,
    #[serde(default)]
    customer_details: Option<CustomerDetails>,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct CustomerDetails {
    #[serde(default)]
    email: Option<String>,
}

/// Decode an already-verified event body into the core event type
pub fn parse_event(payload: &[u8]) -> BookingResult<WebhookEvent> {
    let event: StripeEvent = serde_json::from_slice(payload)
        .map_err(|e| BookingError::WebhookParse(format!("Failed to parse webhook: {}", e)))?;

    debug!(event_id = %event.id, event_type = %event.event_type, provider = PROVIDER, "verified webhook");

    if !CHECKOUT_COMPLETED_EVENTS.contains(&event.event_type.as_str()) {
        return Ok(WebhookEvent::Unknown {
            event_id: event.id,
            event_type: event.event_type,
        });
    }

    let session: SessionObject = serde_json::from_value(event.data.object.clone())
        .map_err(|e| BookingError::WebhookParse(format!("Bad checkout session: {}", e)))?;

    Ok(WebhookEvent::CheckoutCompleted(CheckoutCompleted {
        event_id: event.id,
        session_id: session.id,
        payment_intent_id: session.payment_intent,
        customer_id: session.customer,
        // not on the session object; the reconciler asks for it when needed
        payment_method_id: None,
        customer_email: session
            .customer_details
            .and_then(|d| d.email)
            .or(session.customer_email),
        amount_total: session.amount_total.map(Money::from_cents),
        paid: session.payment_status.as_deref() == Some("paid"),
        metadata: session.metadata,
        raw: event.data.object,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "whsec_test";

    fn completed_body() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "created": 1_700_000_000,
            "data": { "object": {
                "id": "cs_test_123",
                "payment_intent": "pi_123",
                "customer": "cus_123",
                "customer_details": { "email": "anna@example.com" },
                "amount_total": 24500,
                "currency": "eur",
                "payment_status": "paid",
                "metadata": { "purpose": "booking", "payment_mode": "full" }
            }}
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_signature_header() {
        let parsed = parse_signature_header("t=1234567890,v1=abc123,v0=old,v1=def456").unwrap();
        assert_eq!(parsed.timestamp, 1234567890);
        assert_eq!(parsed.signatures, vec!["abc123", "def456"]);

        assert!(parse_signature_header("v1=abc").is_err());
        assert!(parse_signature_header("t=1").is_err());
        assert!(parse_signature_header("").is_err());
    }

    #[test]
    fn test_signature_roundtrip_and_tamper() {
        let body = completed_body();
        let header = signature_header(&body, SECRET, 1_700_000_000).unwrap();
        assert!(verify_signature(&body, &header, SECRET, 300, 1_700_000_100).is_ok());

        let mut tampered = body.clone();
        tampered[10] ^= 1;
        assert!(matches!(
            verify_signature(&tampered, &header, SECRET, 300, 1_700_000_100),
            Err(BookingError::InvalidSignature(_))
        ));
        assert!(verify_signature(&body, &header, "whsec_other", 300, 1_700_000_100).is_err());
    }

    #[test]
    fn test_stale_signature_rejected() {
        let body = completed_body();
        let header = signature_header(&body, SECRET, 1_700_000_000).unwrap();
        assert!(matches!(
            verify_signature(&body, &header, SECRET, 300, 1_700_000_301),
            Err(BookingError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_non_hex_signature_rejected() {
        let body = completed_body();
        assert!(verify_signature(&body, "t=1700000000,v1=zz", SECRET, 300, 1_700_000_000).is_err());
    }

    #[test]
    fn test_parse_completed_session() {
        match parse_event(&completed_body()).unwrap() {
            WebhookEvent::CheckoutCompleted(data) => {
                assert_eq!(data.session_id, "cs_test_123");
                assert_eq!(data.payment_intent_id.as_deref(), Some("pi_123"));
                assert_eq!(data.customer_id.as_deref(), Some("cus_123"));
                assert_eq!(data.customer_email.as_deref(), Some("anna@example.com"));
                assert_eq!(data.amount_total, Some(Money::from_euros(245)));
                assert!(data.paid);
                assert_eq!(data.metadata["payment_mode"], "full");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_unpaid_session_and_other_events() {
        let body = serde_json::to_vec(&json!({
            "id": "evt_2", "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_2", "payment_status": "unpaid" } }
        }))
        .unwrap();
        match parse_event(&body).unwrap() {
            WebhookEvent::CheckoutCompleted(data) => assert!(!data.paid),
            other => panic!("unexpected event {:?}", other),
        }

        let body = serde_json::to_vec(&json!({
            "id": "evt_3", "type": "charge.refunded", "data": { "object": {} }
        }))
        .unwrap();
        assert_eq!(
            parse_event(&body).unwrap(),
            WebhookEvent::Unknown {
                event_id: "evt_3".to_string(),
                event_type: "charge.refunded".to_string()
            }
        );

        assert!(matches!(
            parse_event(b"[]"),
            Err(BookingError::WebhookParse(_))
        ));
    }
}
