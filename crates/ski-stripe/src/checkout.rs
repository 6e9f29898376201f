//! # Stripe Checkout Sessions
//!
//! Hosted checkout in `payment` mode. Installment deposits ask Stripe to keep
//! the card (`setup_future_usage=off_session`) and to create a customer, so
//! the balance can be charged later without the customer present.

use crate::client::{push_metadata, StripeClient};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use ski_core::{BookingResult, CheckoutRequest, CheckoutSession, CURRENCY};
use tracing::info;

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: String,
    #[serde(default)]
    expires_at: Option<i64>,
}

/// Form params for `POST /v1/checkout/sessions`
pub fn session_params(request: &CheckoutRequest) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
    ];

    for (i, item) in request.line_items.iter().enumerate() {
        params.push((
            format!("line_items[{}][price_data][currency]", i),
            CURRENCY.to_string(),
        ));
        params.push((
            format!("line_items[{}][price_data][unit_amount]", i),
            item.unit_amount.cents().to_string(),
        ));
        params.push((
            format!("line_items[{}][price_data][product_data][name]", i),
            item.name.clone(),
        ));
        if let Some(ref desc) = item.description {
            params.push((
                format!("line_items[{}][price_data][product_data][description]", i),
                desc.clone(),
            ));
        }
        params.push((
            format!("line_items[{}][quantity]", i),
            item.quantity.to_string(),
        ));
    }

    if let Some(ref email) = request.customer_email {
        params.push(("customer_email".to_string(), email.clone()));
    }

    if request.retain_payment_method {
        params.push((
            "payment_intent_data[setup_future_usage]".to_string(),
            "off_session".to_string(),
        ));
        params.push(("customer_creation".to_string(), "always".to_string()));
    }

    if let Some(ref promotion_code) = request.promotion_code_id {
        params.push((
            "discounts[0][promotion_code]".to_string(),
            promotion_code.clone(),
        ));
    }

    push_metadata(&mut params, "metadata", &request.metadata);
    params
}

pub async fn create_session(
    client: &StripeClient,
    request: &CheckoutRequest,
) -> BookingResult<CheckoutSession> {
    let params = session_params(request);
    let response: SessionResponse = client
        .post_form(
            "/v1/checkout/sessions",
            &params,
            request.idempotency_key.as_deref(),
        )
        .await?;

    info!(session_id = %response.id, "created Stripe checkout session");

    Ok(CheckoutSession {
        session_id: response.id,
        checkout_url: response.url,
        expires_at: response
            .expires_at
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ski_core::{LineItem, Money};
    use std::collections::HashMap;

    fn request(retain: bool) -> CheckoutRequest {
        CheckoutRequest {
            line_items: vec![LineItem {
                name: "Val Thorens Week (deposit)".to_string(),
                description: Some("12-19 Jan 2027, 2 guest(s)".to_string()),
                unit_amount: Money::from_cents(5550),
                quantity: 1,
            }],
            customer_email: Some("anna@example.com".to_string()),
            success_url: "https://powderpay.eu/ok".to_string(),
            cancel_url: "https://powderpay.eu/cancel".to_string(),
            metadata: HashMap::from([("purpose".to_string(), "booking".to_string())]),
            retain_payment_method: retain,
            promotion_code_id: Some("promo_1".to_string()),
            idempotency_key: None,
        }
    }

    fn has(params: &[(String, String)], key: &str, value: &str) -> bool {
        params.iter().any(|(k, v)| k == key && v == value)
    }

    #[test]
    fn test_installment_params() {
        let params = session_params(&request(true));
        assert!(has(&params, "mode", "payment"));
        assert!(has(&params, "line_items[0][price_data][currency]", "eur"));
        assert!(has(&params, "line_items[0][price_data][unit_amount]", "5550"));
        assert!(has(&params, "payment_intent_data[setup_future_usage]", "off_session"));
        assert!(has(&params, "customer_creation", "always"));
        assert!(has(&params, "discounts[0][promotion_code]", "promo_1"));
        assert!(has(&params, "metadata[purpose]", "booking"));
    }

    #[test]
    fn test_full_params_do_not_keep_card() {
        let params = session_params(&request(false));
        assert!(!params
            .iter()
            .any(|(k, _)| k.starts_with("payment_intent_data")));
    }
}
