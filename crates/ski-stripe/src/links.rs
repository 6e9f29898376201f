//! # Stripe Payment Links
//!
//! One-off links for a balance the scheduler could not collect. Payment Links
//! only take a price id, so an ad-hoc price is created first.

use crate::client::{push_metadata, StripeClient};
use serde::Deserialize;
use ski_core::{BookingResult, PaymentLink, PaymentLinkRequest, CURRENCY};
use tracing::{info, instrument};

#[derive(Debug, Deserialize)]
struct PriceResponse {
    id: String,
}

/// Response from Stripe Payment Link API
#[derive(Debug, Deserialize)]
pub struct PaymentLinkResponse {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub active: bool,
}

pub fn price_params(request: &PaymentLinkRequest) -> Vec<(String, String)> {
    vec![
        ("currency".to_string(), CURRENCY.to_string()),
        ("unit_amount".to_string(), request.amount.cents().to_string()),
        ("product_data[name]".to_string(), request.description.clone()),
    ]
}

/// Link params. Metadata goes on the link and on the resulting intent, so the
/// completed session carries it back through the webhook. The link closes
/// after one completed payment.
pub fn link_params(price_id: &str, request: &PaymentLinkRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("line_items[0][price]".to_string(), price_id.to_string()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        (
            "restrictions[completed_sessions][limit]".to_string(),
            "1".to_string(),
        ),
    ];
    push_metadata(&mut params, "metadata", &request.metadata);
    push_metadata(&mut params, "payment_intent_data[metadata]", &request.metadata);
    params
}

#[instrument(skip_all, fields(amount = %request.amount))]
pub async fn create_link(
    client: &StripeClient,
    request: &PaymentLinkRequest,
) -> BookingResult<PaymentLink> {
    let price: PriceResponse = client
        .post_form("/v1/prices", &price_params(request), None)
        .await?;

    let link: PaymentLinkResponse = client
        .post_form("/v1/payment_links", &link_params(&price.id, request), None)
        .await?;

    info!(link_id = %link.id, price_id = %price.id, "created Stripe payment link");

    Ok(PaymentLink {
        id: link.id,
        url: link.url,
    })
}
