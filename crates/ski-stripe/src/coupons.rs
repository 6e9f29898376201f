//! Promotion code lookup. Codes and their coupons live in Stripe; nothing is
//! mirrored locally.

use crate::client::StripeClient;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use ski_core::{BookingResult, Coupon, Money, PromotionCode};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct PromotionCodeList {
    data: Vec<StripePromotionCode>,
}

#[derive(Debug, Deserialize)]
struct StripePromotionCode {
    id: String,
    code: String,
    active: bool,
    coupon: StripeCoupon,
    #[serde(default)]
    max_redemptions: Option<u64>,
    #[serde(default)]
    times_redeemed: u64,
    #[serde(default)]
    expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripeCoupon {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    valid: bool,
    #[serde(default)]
    percent_off: Option<f64>,
    #[serde(default)]
    amount_off: Option<i64>,
    #[serde(default)]
    max_redemptions: Option<u64>,
    #[serde(default)]
    times_redeemed: u64,
}

impl From<StripePromotionCode> for PromotionCode {
    fn from(promo: StripePromotionCode) -> Self {
        PromotionCode {
            id: promo.id,
            code: promo.code,
            active: promo.active,
            coupon: Coupon {
                id: promo.coupon.id,
                name: promo.coupon.name,
                valid: promo.coupon.valid,
                percent_off: promo.coupon.percent_off,
                amount_off: promo.coupon.amount_off.map(Money::from_cents),
                max_redemptions: promo.coupon.max_redemptions,
                times_redeemed: promo.coupon.times_redeemed,
            },
            max_redemptions: promo.max_redemptions,
            times_redeemed: promo.times_redeemed,
            expires_at: promo
                .expires_at
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        }
    }
}

/// `GET /v1/promotion_codes?code=..&active=true&limit=1`
pub async fn find_promotion_code(
    client: &StripeClient,
    code: &str,
) -> BookingResult<Option<PromotionCode>> {
    let list: PromotionCodeList = client
        .get(
            "/v1/promotion_codes",
            &[("code", code), ("active", "true"), ("limit", "1")],
        )
        .await?;

    let found = list.data.into_iter().next().map(PromotionCode::from);
    debug!(code, found = found.is_some(), "promotion code lookup");
    Ok(found)
}
