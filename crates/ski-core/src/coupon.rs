//! # Coupon Validation
//!
//! Promotion codes are owned by the payment processor. Two local rules sit on
//! top: the group discount needs a minimum group size, and exhausted or
//! expired codes are refused. Read-only; re-run at checkout time.

use crate::error::{BookingError, BookingResult};
use crate::money::Money;
use crate::policy::BookingPolicy;
use crate::processor::{PromotionCode, SharedProcessor};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument};

/// A code that may be attached to a checkout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CouponResult {
    pub code: String,
    /// Processor id attached to the checkout session
    pub promotion_code_id: String,
    pub coupon_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_off: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_off: Option<Money>,
    pub description: String,
}

pub struct CouponValidator {
    processor: SharedProcessor,
    policy: BookingPolicy,
}

impl CouponValidator {
    pub fn new(processor: SharedProcessor, policy: BookingPolicy) -> Self {
        Self { processor, policy }
    }

    #[instrument(skip(self))]
    pub async fn validate(&self, code: &str, group_size: u32) -> BookingResult<CouponResult> {
        let code = code.trim();
        if code.is_empty() {
            return Err(BookingError::Validation(
                "Coupon code is required".to_string(),
            ));
        }
        if group_size == 0 {
            return Err(BookingError::Validation(
                "Group size must be at least 1".to_string(),
            ));
        }

        if self.policy.is_group_code(code) && group_size < self.policy.group_min_size {
            let needed = self.policy.group_min_size - group_size;
            debug!(needed, "group discount refused");
            return Err(BookingError::IneligibleForCoupon {
                code: code.to_uppercase(),
                required: self.policy.group_min_size,
                group_size,
                suggestion: group_suggestion(needed),
            });
        }

        let promotion = self
            .processor
            .find_promotion_code(code)
            .await?
            .filter(|p| p.active)
            .ok_or_else(|| BookingError::CouponNotFound {
                code: code.to_string(),
            })?;

        if is_exhausted(&promotion) {
            return Err(BookingError::CouponExpired {
                code: code.to_string(),
            });
        }

        info!(promotion_code_id = %promotion.id, "coupon accepted");
        Ok(CouponResult {
            description: describe(&promotion),
            code: promotion.code,
            promotion_code_id: promotion.id,
            coupon_id: promotion.coupon.id,
            percent_off: promotion.coupon.percent_off,
            amount_off: promotion.coupon.amount_off,
        })
    }
}

fn group_suggestion(needed: u32) -> String {
    if needed == 1 {
        "Add 1 more person to your group to use this discount".to_string()
    } else {
        format!(
            "Add {} more people to your group to use this discount",
            needed
        )
    }
}

fn is_exhausted(promotion: &PromotionCode) -> bool {
    let coupon = &promotion.coupon;
    !coupon.valid
        || coupon
            .max_redemptions
            .map(|max| coupon.times_redeemed >= max)
            .unwrap_or(false)
        || promotion
            .max_redemptions
            .map(|max| promotion.times_redeemed >= max)
            .unwrap_or(false)
        || promotion
            .expires_at
            .map(|at| at <= Utc::now())
            .unwrap_or(false)
}

fn describe(promotion: &PromotionCode) -> String {
    let coupon = &promotion.coupon;
    match (coupon.percent_off, coupon.amount_off) {
        (Some(pct), _) => format!("{}% off", pct),
        (None, Some(amount)) => format!("{} off", amount),
        (None, None) => coupon
            .name
            .clone()
            .unwrap_or_else(|| promotion.code.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::Coupon;
    use crate::testing::FakeProcessor;
    use chrono::Duration;
    use std::sync::Arc;

    fn promotion(code: &str) -> PromotionCode {
        PromotionCode {
            id: format!("promo_{}", code.to_lowercase()),
            code: code.to_string(),
            active: true,
            coupon: Coupon {
                id: "coupon_group".to_string(),
                name: Some("Group discount".to_string()),
                valid: true,
                percent_off: Some(10.0),
                amount_off: None,
                max_redemptions: None,
                times_redeemed: 0,
            },
            max_redemptions: None,
            times_redeemed: 0,
            expires_at: None,
        }
    }

    fn validator(codes: Vec<PromotionCode>) -> (CouponValidator, Arc<FakeProcessor>) {
        let processor = Arc::new(FakeProcessor::new());
        for code in codes {
            processor.add_promotion_code(code);
        }
        (
            CouponValidator::new(processor.clone(), BookingPolicy::default()),
            processor,
        )
    }

    #[tokio::test]
    async fn test_group_code_needs_four() {
        let (validator, _) = validator(vec![promotion("4ORMORE")]);

        let err = validator.validate("4ORMORE", 3).await.unwrap_err();
        match &err {
            BookingError::IneligibleForCoupon {
                required,
                group_size,
                suggestion,
                ..
            } => {
                assert_eq!(*required, 4);
                assert_eq!(*group_size, 3);
                assert!(suggestion.contains("1 more"));
            }
            other => panic!("unexpected error {:?}", other),
        }

        let ok = validator.validate("4ORMORE", 4).await.unwrap();
        assert_eq!(ok.promotion_code_id, "promo_4ormore");
        assert_eq!(ok.description, "10% off");
    }

    #[tokio::test]
    async fn test_group_suggestion_plural() {
        let (validator, processor) = validator(vec![promotion("4ORMORE")]);
        let err = validator.validate("4ormore", 1).await.unwrap_err();
        assert_eq!(err.suggestion(), Some("Add 3 more people to your group to use this discount"));
        // gate is local; the processor was never asked
        assert_eq!(processor.promotion_lookups(), 0);
    }

    #[tokio::test]
    async fn test_unknown_and_inactive_codes() {
        let mut inactive = promotion("OLD");
        inactive.active = false;
        let (validator, _) = validator(vec![inactive]);

        assert!(matches!(
            validator.validate("NOPE", 2).await,
            Err(BookingError::CouponNotFound { .. })
        ));
        assert!(matches!(
            validator.validate("OLD", 2).await,
            Err(BookingError::CouponNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_exhausted_codes() {
        let mut used_up = promotion("USEDUP");
        used_up.max_redemptions = Some(5);
        used_up.times_redeemed = 5;

        let mut coupon_used_up = promotion("COUPONUSED");
        coupon_used_up.coupon.max_redemptions = Some(1);
        coupon_used_up.coupon.times_redeemed = 1;

        let mut invalid = promotion("INVALID");
        invalid.coupon.valid = false;

        let mut expired = promotion("EXPIRED");
        expired.expires_at = Some(Utc::now() - Duration::days(1));

        let (validator, _) = validator(vec![used_up, coupon_used_up, invalid, expired]);
        for code in ["USEDUP", "COUPONUSED", "INVALID", "EXPIRED"] {
            assert!(
                matches!(
                    validator.validate(code, 2).await,
                    Err(BookingError::CouponExpired { .. })
                ),
                "{} should be expired",
                code
            );
        }
    }

    #[tokio::test]
    async fn test_input_validation() {
        let (validator, _) = validator(vec![]);
        assert!(matches!(
            validator.validate("  ", 2).await,
            Err(BookingError::Validation(_))
        ));
        assert!(matches!(
            validator.validate("SNOW", 0).await,
            Err(BookingError::Validation(_))
        ));
    }
}
