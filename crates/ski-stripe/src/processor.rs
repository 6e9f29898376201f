//! # Stripe Processor
//!
//! `PaymentProcessor` backed by the Stripe REST API.

use crate::client::{StripeClient, PROVIDER};
use crate::config::StripeConfig;
use crate::{charges, checkout, coupons, links, webhook};
use async_trait::async_trait;
use chrono::Utc;
use ski_core::{
    BookingResult, ChargeResult, CheckoutRequest, CheckoutSession, OffSessionCharge, PaymentLink,
    PaymentLinkRequest, PaymentProcessor, PromotionCode, WebhookEvent,
};
use tracing::instrument;

pub struct StripeProcessor {
    client: StripeClient,
}

impl StripeProcessor {
    pub fn new(config: StripeConfig) -> BookingResult<Self> {
        Ok(Self {
            client: StripeClient::new(config)?,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> BookingResult<Self> {
        Self::new(StripeConfig::from_env()?)
    }

    pub fn config(&self) -> &StripeConfig {
        self.client.config()
    }
}

#[async_trait]
impl PaymentProcessor for StripeProcessor {
    #[instrument(skip(self, request), fields(provider = PROVIDER))]
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> BookingResult<CheckoutSession> {
        checkout::create_session(&self.client, request).await
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> BookingResult<WebhookEvent> {
        let config = self.client.config();
        webhook::verify_signature(
            payload,
            signature,
            &config.webhook_secret,
            config.signature_tolerance_secs,
            Utc::now().timestamp(),
        )?;
        webhook::parse_event(payload)
    }

    #[instrument(skip(self, charge), fields(provider = PROVIDER, amount = %charge.amount))]
    async fn charge_off_session(&self, charge: &OffSessionCharge) -> BookingResult<ChargeResult> {
        charges::charge_off_session(&self.client, charge).await
    }

    async fn create_payment_link(
        &self,
        request: &PaymentLinkRequest,
    ) -> BookingResult<PaymentLink> {
        links::create_link(&self.client, request).await
    }

    async fn find_promotion_code(&self, code: &str) -> BookingResult<Option<PromotionCode>> {
        coupons::find_promotion_code(&self.client, code).await
    }

    async fn payment_method_for_intent(&self, intent_id: &str) -> BookingResult<Option<String>> {
        charges::payment_method_for_intent(&self.client, intent_id).await
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
