//! # Test Doubles
//!
//! `FakeProcessor` records every call and can be scripted to decline or hang
//! charges for specific customers. Webhook "signatures" are the shared secret
//! itself and payloads are JSON-encoded [`WebhookEvent`]s.

use crate::error::{BookingError, BookingResult};
use crate::event::{CheckoutCompleted, WebhookEvent};
use crate::money::Money;
use crate::processor::{
    ChargeOutcome, ChargeResult, CheckoutRequest, CheckoutSession, OffSessionCharge, PaymentLink,
    PaymentLinkRequest, PaymentProcessor, PromotionCode,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

pub const FAKE_WEBHOOK_SECRET: &str = "whsec_fake";

#[derive(Default)]
struct FakeState {
    checkout_requests: Vec<CheckoutRequest>,
    charges: Vec<OffSessionCharge>,
    links: Vec<PaymentLinkRequest>,
    promotion_codes: HashMap<String, PromotionCode>,
    promotion_lookups: usize,
    declined_customers: HashSet<String>,
    erroring_customers: HashSet<String>,
    hanging_customers: HashSet<String>,
    intent_payment_methods: HashMap<String, String>,
    fail_checkout: bool,
    fail_links: bool,
    fail_promotions: bool,
}

#[derive(Default)]
pub struct FakeProcessor {
    state: Mutex<FakeState>,
}

impl FakeProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut state)
    }

    pub fn add_promotion_code(&self, code: PromotionCode) {
        self.with_state(|s| {
            s.promotion_codes.insert(code.code.to_uppercase(), code);
        });
    }

    /// Charges for this customer come back declined
    pub fn decline_customer(&self, customer_id: &str) {
        self.with_state(|s| s.declined_customers.insert(customer_id.to_string()));
    }

    /// Charges for this customer fail with a provider error
    pub fn error_customer(&self, customer_id: &str) {
        self.with_state(|s| s.erroring_customers.insert(customer_id.to_string()));
    }

    /// Charges for this customer never answer
    pub fn hang_customer(&self, customer_id: &str) {
        self.with_state(|s| s.hanging_customers.insert(customer_id.to_string()));
    }

    pub fn set_intent_payment_method(&self, intent_id: &str, payment_method_id: &str) {
        self.with_state(|s| {
            s.intent_payment_methods
                .insert(intent_id.to_string(), payment_method_id.to_string())
        });
    }

    pub fn fail_checkout(&self, fail: bool) {
        self.with_state(|s| s.fail_checkout = fail);
    }

    pub fn fail_links(&self, fail: bool) {
        self.with_state(|s| s.fail_links = fail);
    }

    pub fn fail_promotions(&self, fail: bool) {
        self.with_state(|s| s.fail_promotions = fail);
    }

    pub fn checkout_requests(&self) -> Vec<CheckoutRequest> {
        self.with_state(|s| s.checkout_requests.clone())
    }

    pub fn charges(&self) -> Vec<OffSessionCharge> {
        self.with_state(|s| s.charges.clone())
    }

    pub fn links(&self) -> Vec<PaymentLinkRequest> {
        self.with_state(|s| s.links.clone())
    }

    pub fn promotion_lookups(&self) -> usize {
        self.with_state(|s| s.promotion_lookups)
    }

    /// Signature header the fake accepts
    pub fn sign(_payload: &[u8]) -> String {
        FAKE_WEBHOOK_SECRET.to_string()
    }

    /// JSON body of a paid checkout-completed event
    pub fn completed_payload(
        session_id: &str,
        amount: Money,
        metadata: HashMap<String, String>,
    ) -> Vec<u8> {
        let event = WebhookEvent::CheckoutCompleted(CheckoutCompleted {
            event_id: format!("evt_{}", session_id),
            session_id: session_id.to_string(),
            payment_intent_id: Some(format!("pi_{}", session_id)),
            customer_id: Some(format!("cus_{}", session_id)),
            payment_method_id: Some(format!("pm_{}", session_id)),
            customer_email: None,
            amount_total: Some(amount),
            paid: true,
            metadata,
            raw: serde_json::json!({ "id": session_id }),
        });
        serde_json::to_vec(&event).unwrap_or_default()
    }
}

#[async_trait]
impl PaymentProcessor for FakeProcessor {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> BookingResult<CheckoutSession> {
        self.with_state(|s| {
            if s.fail_checkout {
                return Err(BookingError::Provider {
                    provider: "fake".to_string(),
                    message: "checkout unavailable".to_string(),
                });
            }
            s.checkout_requests.push(request.clone());
            let n = s.checkout_requests.len();
            Ok(CheckoutSession {
                session_id: format!("cs_fake_{}", n),
                checkout_url: format!("https://pay.example/cs_fake_{}", n),
                expires_at: None,
            })
        })
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> BookingResult<WebhookEvent> {
        if signature != FAKE_WEBHOOK_SECRET {
            return Err(BookingError::InvalidSignature(
                "Signature mismatch".to_string(),
            ));
        }
        serde_json::from_slice(payload).map_err(|e| BookingError::WebhookParse(e.to_string()))
    }

    async fn charge_off_session(&self, charge: &OffSessionCharge) -> BookingResult<ChargeResult> {
        enum Script {
            Succeed(usize),
            Decline,
            Error,
            Hang,
        }

        let script = self.with_state(|s| {
            s.charges.push(charge.clone());
            if s.hanging_customers.contains(&charge.customer_id) {
                Script::Hang
            } else if s.erroring_customers.contains(&charge.customer_id) {
                Script::Error
            } else if s.declined_customers.contains(&charge.customer_id) {
                Script::Decline
            } else {
                Script::Succeed(s.charges.len())
            }
        });

        match script {
            Script::Succeed(n) => Ok(ChargeResult {
                payment_id: Some(format!("pi_balance_{}", n)),
                outcome: ChargeOutcome::Succeeded,
                raw: Some(serde_json::json!({ "status": "succeeded" })),
            }),
            Script::Decline => Ok(ChargeResult {
                payment_id: None,
                outcome: ChargeOutcome::Declined {
                    reason: "card_declined".to_string(),
                },
                raw: None,
            }),
            Script::Error => Err(BookingError::Provider {
                provider: "fake".to_string(),
                message: "processor exploded".to_string(),
            }),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
                Err(BookingError::Network("hung".to_string()))
            }
        }
    }

    async fn create_payment_link(
        &self,
        request: &PaymentLinkRequest,
    ) -> BookingResult<PaymentLink> {
        self.with_state(|s| {
            if s.fail_links {
                return Err(BookingError::Network("links unavailable".to_string()));
            }
            s.links.push(request.clone());
            let n = s.links.len();
            Ok(PaymentLink {
                id: format!("plink_{}", n),
                url: format!("https://pay.example/link/{}", n),
            })
        })
    }

    async fn find_promotion_code(&self, code: &str) -> BookingResult<Option<PromotionCode>> {
        self.with_state(|s| {
            s.promotion_lookups += 1;
            if s.fail_promotions {
                return Err(BookingError::Network("promotions unavailable".to_string()));
            }
            Ok(s.promotion_codes.get(&code.to_uppercase()).cloned())
        })
    }

    async fn payment_method_for_intent(&self, intent_id: &str) -> BookingResult<Option<String>> {
        Ok(self.with_state(|s| s.intent_payment_methods.get(intent_id).cloned()))
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}
