//! # Off-Session Charges
//!
//! Merchant-initiated PaymentIntents against a stored card. Card errors come
//! back as HTTP 402 and are a normal outcome (`Declined`), not an error.

use crate::client::{push_metadata, StripeClient, StripeFailure};
use serde::Deserialize;
use ski_core::{BookingResult, ChargeOutcome, ChargeResult, OffSessionCharge, CURRENCY};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct PaymentIntentResponse {
    id: String,
    status: String,
    #[serde(default)]
    payment_method: Option<String>,
    #[serde(default)]
    last_payment_error: Option<LastPaymentError>,
}

#[derive(Debug, Deserialize)]
struct LastPaymentError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    decline_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub fn charge_params(charge: &OffSessionCharge) -> Vec<(String, String)> {
    let mut params = vec![
        ("amount".to_string(), charge.amount.cents().to_string()),
        ("currency".to_string(), CURRENCY.to_string()),
        ("customer".to_string(), charge.customer_id.clone()),
        ("payment_method".to_string(), charge.payment_method_id.clone()),
        ("off_session".to_string(), "true".to_string()),
        ("confirm".to_string(), "true".to_string()),
        ("description".to_string(), charge.description.clone()),
    ];
    push_metadata(&mut params, "metadata", &charge.metadata);
    params
}

pub async fn charge_off_session(
    client: &StripeClient,
    charge: &OffSessionCharge,
) -> BookingResult<ChargeResult> {
    let result = client
        .post_form::<serde_json::Value>(
            "/v1/payment_intents",
            &charge_params(charge),
            Some(&charge.idempotency_key),
        )
        .await;

    match result {
        Ok(raw) => {
            let intent: PaymentIntentResponse = serde_json::from_value(raw.clone())
                .map_err(|e| StripeFailure::Decode(e.to_string()))?;
            let outcome = if intent.status == "succeeded" {
                info!(payment_intent = %intent.id, "off-session charge succeeded");
                ChargeOutcome::Succeeded
            } else {
                let reason = intent
                    .last_payment_error
                    .and_then(|e| e.decline_code.or(e.code).or(e.message))
                    .unwrap_or(intent.status);
                warn!(payment_intent = %intent.id, reason = %reason, "off-session charge not completed");
                ChargeOutcome::Declined { reason }
            };
            Ok(ChargeResult {
                payment_id: Some(intent.id),
                outcome,
                raw: Some(raw),
            })
        }
        Err(StripeFailure::Api { body, .. }) if body.is_card_error() => {
            let reason = body.reason();
            warn!(reason = %reason, "off-session charge declined");
            let payment_id = body
                .payment_intent
                .as_ref()
                .and_then(|pi| pi.get("id"))
                .and_then(|id| id.as_str())
                .map(String::from);
            Ok(ChargeResult {
                payment_id,
                outcome: ChargeOutcome::Declined { reason },
                raw: body.payment_intent,
            })
        }
        Err(other) => Err(other.into()),
    }
}

/// `GET /v1/payment_intents/{id}` → attached payment method
pub async fn payment_method_for_intent(
    client: &StripeClient,
    intent_id: &str,
) -> BookingResult<Option<String>> {
    let intent: PaymentIntentResponse = client
        .get(&format!("/v1/payment_intents/{}", intent_id), &[])
        .await?;
    Ok(intent.payment_method)
}
