//! # Payment Processor Trait
//!
//! Capability contract for the hosted payment processor. The core never sees a
//! wire format; implementations (Stripe in `ski-stripe`) translate.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  PaymentProcessor (trait)                   │
//! │  ├── create_checkout_session()   redirect checkout          │
//! │  ├── verify_webhook()            signature, then typed event│
//! │  ├── charge_off_session()        merchant-initiated charge  │
//! │  ├── create_payment_link()       hosted fallback link       │
//! │  ├── find_promotion_code()       coupon lookup              │
//! │  └── payment_method_for_intent() stored method lookup       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::error::BookingResult;
use crate::event::WebhookEvent;
use crate::money::Money;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A priced line on the hosted checkout page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub unit_amount: Money,
    pub quantity: u32,
}

/// Everything needed to open a redirect checkout session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub line_items: Vec<LineItem>,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
    /// Keep the payment method for a later off-session charge
    pub retain_payment_method: bool,
    /// Processor id of a validated promotion code
    pub promotion_code_id: Option<String>,
    pub idempotency_key: Option<String>,
}

/// A checkout session created by the processor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_id: String,
    /// URL to redirect customer to for payment
    pub checkout_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A merchant-initiated charge against a stored payment method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffSessionCharge {
    pub amount: Money,
    pub customer_id: String,
    pub payment_method_id: String,
    pub description: String,
    pub metadata: HashMap<String, String>,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChargeOutcome {
    Succeeded,
    /// Card declined, authentication required, method invalidated...
    Declined { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeResult {
    /// Provider charge/intent id, when one was created
    pub payment_id: Option<String>,
    pub outcome: ChargeOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl ChargeResult {
    pub fn is_succeeded(&self) -> bool {
        matches!(self.outcome, ChargeOutcome::Succeeded)
    }
}

/// A one-off hosted payment link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentLinkRequest {
    pub amount: Money,
    pub description: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLink {
    pub id: String,
    pub url: String,
}

/// Processor-owned discount definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// False once the processor considers it exhausted or expired
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_off: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_off: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_redemptions: Option<u64>,
    #[serde(default)]
    pub times_redeemed: u64,
}

/// Customer-facing code pointing at a [`Coupon`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionCode {
    pub id: String,
    pub code: String,
    pub active: bool,
    pub coupon: Coupon,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_redemptions: Option<u64>,
    #[serde(default)]
    pub times_redeemed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Core trait for payment processor implementations.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Create a redirect checkout session.
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> BookingResult<CheckoutSession>;

    /// Verify a webhook signature over the raw body, then decode the event.
    ///
    /// Nothing in `payload` is parsed before the signature checks out.
    async fn verify_webhook(&self, payload: &[u8], signature: &str)
        -> BookingResult<WebhookEvent>;

    /// Charge a stored payment method without the customer present.
    ///
    /// A declined charge is `Ok` with [`ChargeOutcome::Declined`]; `Err` means
    /// the processor could not be reached or answered garbage.
    async fn charge_off_session(&self, charge: &OffSessionCharge) -> BookingResult<ChargeResult>;

    /// Create a hosted, shareable payment link.
    async fn create_payment_link(&self, request: &PaymentLinkRequest)
        -> BookingResult<PaymentLink>;

    /// Look up a customer-facing promotion code.
    async fn find_promotion_code(&self, code: &str) -> BookingResult<Option<PromotionCode>>;

    /// Payment method attached to a payment intent, if any.
    async fn payment_method_for_intent(&self, intent_id: &str) -> BookingResult<Option<String>>;

    /// Get the provider name (for logging and transaction records).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared payment processor (dynamic dispatch)
pub type SharedProcessor = Arc<dyn PaymentProcessor>;

/// Configuration for URLs used in checkout
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    /// Base URL of the site (e.g., "https://powderpay.eu")
    pub base_url: String,
    pub success_path: String,
    pub cancel_path: String,
}

impl CheckoutUrls {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            success_path: "/booking/confirmed".to_string(),
            cancel_path: "/booking/cancelled".to_string(),
        }
    }

    /// Success URL with the processor's session id placeholder
    pub fn success_url(&self) -> String {
        format!(
            "{}{}?session_id={{CHECKOUT_SESSION_ID}}",
            self.base_url, self.success_path
        )
    }

    pub fn cancel_url(&self) -> String {
        format!("{}{}", self.base_url, self.cancel_path)
    }
}

impl Default for CheckoutUrls {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}
