//! # Webhook Events
//!
//! Strongly typed payment events, decoded once at the processor boundary.
//! Anything the booking lifecycle does not act on lands in `Unknown`.

use crate::money::Money;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A verified, decoded webhook event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WebhookEvent {
    /// Hosted checkout finished
    CheckoutCompleted(CheckoutCompleted),
    /// Acknowledged and ignored
    Unknown { event_id: String, event_type: String },
}

impl WebhookEvent {
    pub fn event_id(&self) -> &str {
        match self {
            WebhookEvent::CheckoutCompleted(data) => &data.event_id,
            WebhookEvent::Unknown { event_id, .. } => event_id,
        }
    }

    pub fn event_type(&self) -> &str {
        match self {
            WebhookEvent::CheckoutCompleted(_) => "checkout.completed",
            WebhookEvent::Unknown { event_type, .. } => event_type,
        }
    }
}

/// Data of a completed checkout session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutCompleted {
    pub event_id: String,
    /// Checkout session id; the idempotency key for booking creation
    pub session_id: String,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub payment_method_id: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    /// Amount actually collected, after discounts
    #[serde(default)]
    pub amount_total: Option<Money>,
    /// Whether the money has been collected
    pub paid: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Raw processor object, kept on the transaction row
    #[serde(default)]
    pub raw: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_tagged_event() {
        let event: WebhookEvent = serde_json::from_value(json!({
            "kind": "checkout_completed",
            "event_id": "evt_1",
            "session_id": "cs_1",
            "amount_total": 24500,
            "paid": true,
            "metadata": { "purpose": "booking" }
        }))
        .unwrap();

        match event {
            WebhookEvent::CheckoutCompleted(data) => {
                assert_eq!(data.session_id, "cs_1");
                assert_eq!(data.amount_total, Some(Money::from_euros(245)));
                assert!(data.paid);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_accessors() {
        let event = WebhookEvent::Unknown {
            event_id: "evt_2".to_string(),
            event_type: "invoice.paid".to_string(),
        };
        assert_eq!(event.event_id(), "evt_2");
        assert_eq!(event.event_type(), "invoice.paid");
    }
}
