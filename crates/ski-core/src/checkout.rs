//! # Checkout Session Builder
//!
//! Turns a client-held draft into a hosted checkout session. Nothing is
//! persisted here: the draft and quoted amounts travel in session metadata
//! and the booking only comes into existence when the webhook confirms
//! payment.

use crate::booking::{BookingDraft, PaymentPlan};
use crate::coupon::CouponValidator;
use crate::error::{BookingError, BookingResult, ErrorKind};
use crate::lead::LeadStatus;
use crate::metadata::BookingMetadata;
use crate::money::Money;
use crate::package::PackageCatalog;
use crate::policy::BookingPolicy;
use crate::processor::{CheckoutRequest, CheckoutUrls, LineItem, SharedProcessor};
use crate::store::{advance_lead, SharedStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Where to send the customer's browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutRedirect {
    pub session_id: String,
    pub redirect_url: String,
    /// Amount charged now (deposit or full total)
    pub charge_amount: Money,
    pub payment_mode: PaymentPlan,
}

pub struct CheckoutBuilder {
    processor: SharedProcessor,
    store: SharedStore,
    catalog: Arc<PackageCatalog>,
    coupons: Arc<CouponValidator>,
    policy: BookingPolicy,
    urls: CheckoutUrls,
}

impl CheckoutBuilder {
    pub fn new(
        processor: SharedProcessor,
        store: SharedStore,
        catalog: Arc<PackageCatalog>,
        coupons: Arc<CouponValidator>,
        policy: BookingPolicy,
        urls: CheckoutUrls,
    ) -> Self {
        Self {
            processor,
            store,
            catalog,
            coupons,
            policy,
            urls,
        }
    }

    #[instrument(skip(self, draft), fields(package_id = %draft.package_id, guests = draft.number_of_guests))]
    pub async fn build_session(
        &self,
        draft: BookingDraft,
        mode: PaymentPlan,
        coupon: Option<&str>,
    ) -> BookingResult<CheckoutRedirect> {
        draft.validate()?;

        let package = self
            .catalog
            .get(&draft.package_id)
            .ok_or_else(|| BookingError::PackageNotFound {
                package_id: draft.package_id.clone(),
            })?;
        if package.price != draft.package_price {
            return Err(BookingError::Validation(format!(
                "Package price {} does not match {} for {}",
                draft.package_price, package.price, package.id
            )));
        }

        let floor = package.price.times(draft.number_of_guests);
        if draft.total_amount < floor {
            return Err(BookingError::Validation(format!(
                "Total {} is below {} for {} guest(s) of {}",
                draft.total_amount, floor, draft.number_of_guests, package.id
            )));
        }

        let total = draft.total_amount;
        let (charge, remaining, balance_due_date) = match mode {
            PaymentPlan::Full => (total, Money::ZERO, None),
            PaymentPlan::Installment => {
                let due = package
                    .balance_due_date
                    .or(self.policy.default_balance_due_date)
                    .ok_or_else(|| {
                        BookingError::Validation(format!(
                            "Package {} does not offer installment payment",
                            package.id
                        ))
                    })?;
                let deposit = self.policy.deposit_for(total);
                (deposit, total - deposit, Some(due))
            }
        };

        let coupon = match coupon.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => Some(
                self.coupons
                    .validate(code, draft.number_of_guests)
                    .await
                    .map_err(|e| match e.kind() {
                        ErrorKind::Upstream => {
                            error!(error = %e, provider = self.processor.provider_name(), "coupon lookup failed");
                            BookingError::ProcessorUnavailable(e.to_string())
                        }
                        _ => e,
                    })?,
            ),
            None => None,
        };

        let metadata = BookingMetadata {
            draft: draft.clone(),
            payment_mode: mode,
            total_amount: total,
            charge_amount: charge,
            remaining_amount: remaining,
            balance_due_date,
            coupon_code: coupon.as_ref().map(|c| c.code.clone()),
        };

        let line_name = match mode {
            PaymentPlan::Full => package.name.clone(),
            PaymentPlan::Installment => format!("{} (deposit)", package.name),
        };
        let request = CheckoutRequest {
            line_items: vec![LineItem {
                name: line_name,
                description: Some(format!(
                    "{}, {} guest(s)",
                    package.dates, draft.number_of_guests
                )),
                unit_amount: charge,
                quantity: 1,
            }],
            customer_email: Some(draft.email.trim().to_string()),
            success_url: self.urls.success_url(),
            cancel_url: self.urls.cancel_url(),
            metadata: metadata.to_map()?,
            retain_payment_method: mode == PaymentPlan::Installment,
            promotion_code_id: coupon.map(|c| c.promotion_code_id),
            idempotency_key: None,
        };

        let session = self
            .processor
            .create_checkout_session(&request)
            .await
            .map_err(|e| {
                error!(error = %e, provider = self.processor.provider_name(), "checkout session failed");
                BookingError::ProcessorUnavailable(e.to_string())
            })?;

        info!(
            session_id = %session.session_id,
            charge = %charge,
            payment_mode = %mode,
            "checkout session created"
        );

        if let Err(e) = advance_lead(self.store.as_ref(), &draft.email, LeadStatus::BookingStarted).await
        {
            warn!(error = %e, "could not advance lead");
        }

        Ok(CheckoutRedirect {
            session_id: session.session_id,
            redirect_url: session.checkout_url,
            charge_amount: charge,
            payment_mode: mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::GuestDraft;
    use crate::lead::Lead;
    use crate::memory::MemoryStore;
    use crate::metadata::session_purpose;
    use crate::metadata::SessionPurpose;
    use crate::package::Package;
    use crate::processor::{Coupon, PromotionCode};
    use crate::store::BookingStore;
    use crate::testing::FakeProcessor;
    use chrono::NaiveDate;

    fn due() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 12, 1).unwrap()
    }

    fn catalog() -> PackageCatalog {
        PackageCatalog::new()
            .with_package(
                Package::new(
                    "val-thorens-week",
                    "Val Thorens Week",
                    Money::from_euros(185),
                    "12-19 Jan 2027",
                )
                .with_balance_due_date(due()),
            )
            .with_package(Package::new(
                "weekend",
                "Weekend Escape",
                Money::from_euros(245),
                "5-7 Feb 2027",
            ))
    }

    fn draft(package_id: &str, price: i64, guests: u32) -> BookingDraft {
        BookingDraft {
            email: "anna@example.com".to_string(),
            name: "Anna Berg".to_string(),
            phone: None,
            package_id: package_id.to_string(),
            package_name: "Package".to_string(),
            package_price: Money::from_euros(price),
            dates: "Jan".to_string(),
            number_of_guests: guests,
            room_type: None,
            add_ons: vec![],
            total_amount: Money::from_euros(price).times(guests),
            guests: (0..guests)
                .map(|i| GuestDraft {
                    name: format!("Guest {}", i + 1),
                    email: None,
                    phone: None,
                    date_of_birth: None,
                })
                .collect(),
        }
    }

    fn group_code() -> PromotionCode {
        PromotionCode {
            id: "promo_group".to_string(),
            code: "4ORMORE".to_string(),
            active: true,
            coupon: Coupon {
                id: "coupon_group".to_string(),
                name: None,
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

    struct Fixture {
        builder: CheckoutBuilder,
        processor: Arc<FakeProcessor>,
        store: Arc<MemoryStore>,
    }

    fn fixture() -> Fixture {
        let processor = Arc::new(FakeProcessor::new());
        processor.add_promotion_code(group_code());
        let store = Arc::new(MemoryStore::new());
        let policy = BookingPolicy::default();
        let coupons = Arc::new(CouponValidator::new(processor.clone(), policy.clone()));
        let builder = CheckoutBuilder::new(
            processor.clone(),
            store.clone(),
            Arc::new(catalog()),
            coupons,
            policy,
            CheckoutUrls::new("https://powderpay.eu"),
        );
        Fixture {
            builder,
            processor,
            store,
        }
    }

    #[tokio::test]
    async fn test_full_mode_charges_total() {
        let f = fixture();
        let redirect = f
            .builder
            .build_session(draft("weekend", 245, 2), PaymentPlan::Full, None)
            .await
            .unwrap();

        assert_eq!(redirect.charge_amount, Money::from_euros(490));
        assert_eq!(redirect.redirect_url, "https://pay.example/cs_fake_1");

        let requests = f.processor.checkout_requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert!(!request.retain_payment_method);
        assert_eq!(request.line_items[0].unit_amount, Money::from_euros(490));
        assert_eq!(request.customer_email.as_deref(), Some("anna@example.com"));
        assert!(request.success_url.contains("{CHECKOUT_SESSION_ID}"));

        match session_purpose(&request.metadata).unwrap() {
            SessionPurpose::Booking(meta) => {
                assert_eq!(meta.payment_mode, PaymentPlan::Full);
                assert_eq!(meta.remaining_amount, Money::ZERO);
                assert_eq!(meta.balance_due_date, None);
                assert_eq!(meta.draft, draft("weekend", 245, 2));
            }
            other => panic!("unexpected purpose {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_installment_mode_charges_deposit() {
        let f = fixture();
        let redirect = f
            .builder
            .build_session(
                draft("val-thorens-week", 185, 1),
                PaymentPlan::Installment,
                None,
            )
            .await
            .unwrap();

        assert_eq!(redirect.charge_amount, Money::from_cents(5550));
        let request = &f.processor.checkout_requests()[0];
        assert!(request.retain_payment_method);
        assert_eq!(request.metadata["deposit_amount"], "5550");
        assert_eq!(request.metadata["remaining_amount"], "12950");
        assert_eq!(request.metadata["balance_due_date"], "2026-12-01");
    }

    #[tokio::test]
    async fn test_installment_needs_due_date() {
        let f = fixture();
        let err = f
            .builder
            .build_session(draft("weekend", 245, 1), PaymentPlan::Installment, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
        assert!(f.processor.checkout_requests().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_package_and_price_mismatch() {
        let f = fixture();
        assert!(matches!(
            f.builder
                .build_session(draft("nowhere", 100, 1), PaymentPlan::Full, None)
                .await,
            Err(BookingError::PackageNotFound { .. })
        ));
        assert!(matches!(
            f.builder
                .build_session(draft("weekend", 99, 1), PaymentPlan::Full, None)
                .await,
            Err(BookingError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_total_below_package_price_rejected() {
        let f = fixture();
        let mut cheap = draft("weekend", 245, 2);
        cheap.total_amount = Money::from_cents(1);
        let err = f
            .builder
            .build_session(cheap, PaymentPlan::Full, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));

        // one guest's worth for two guests is still short
        let mut short = draft("weekend", 245, 2);
        short.total_amount = Money::from_euros(245);
        assert!(matches!(
            f.builder.build_session(short, PaymentPlan::Full, None).await,
            Err(BookingError::Validation(_))
        ));

        // add-ons may raise the total
        let mut extras = draft("weekend", 245, 2);
        extras.add_ons = vec!["ski-pass".to_string()];
        extras.total_amount = Money::from_euros(560);
        let redirect = f
            .builder
            .build_session(extras, PaymentPlan::Full, None)
            .await
            .unwrap();
        assert_eq!(redirect.charge_amount, Money::from_euros(560));
        assert_eq!(f.processor.checkout_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_coupon_lookup_failure_is_unavailable() {
        let f = fixture();
        f.processor.fail_promotions(true);
        let err = f
            .builder
            .build_session(draft("weekend", 245, 4), PaymentPlan::Full, Some("4ORMORE"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::ProcessorUnavailable(_)));
        assert_eq!(err.status_code(), 502);
        assert!(f.processor.checkout_requests().is_empty());

        // coupon verdicts pass through untouched
        f.processor.fail_promotions(false);
        assert!(matches!(
            f.builder
                .build_session(draft("weekend", 245, 4), PaymentPlan::Full, Some("NOPE"))
                .await,
            Err(BookingError::CouponNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_coupon_revalidated_against_group() {
        let f = fixture();
        let err = f
            .builder
            .build_session(draft("weekend", 245, 3), PaymentPlan::Full, Some("4ORMORE"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::IneligibleForCoupon { .. }));
        assert!(f.processor.checkout_requests().is_empty());

        f.builder
            .build_session(draft("weekend", 245, 4), PaymentPlan::Full, Some("4ormore"))
            .await
            .unwrap();
        let request = &f.processor.checkout_requests()[0];
        assert_eq!(request.promotion_code_id.as_deref(), Some("promo_group"));
        // discount is applied by the processor, not subtracted locally
        assert_eq!(request.line_items[0].unit_amount, Money::from_euros(980));
        assert_eq!(request.metadata["coupon_code"], "4ORMORE");
    }

    #[tokio::test]
    async fn test_processor_failure_is_unavailable() {
        let f = fixture();
        f.processor.fail_checkout(true);
        let err = f
            .builder
            .build_session(draft("weekend", 245, 1), PaymentPlan::Full, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::ProcessorUnavailable(_)));
        assert!(!err.public_message().contains("checkout unavailable"));
        assert_eq!(f.store.booking_count().await, 0);
    }

    #[tokio::test]
    async fn test_lead_advanced_to_started() {
        let f = fixture();
        f.store
            .create_lead(Lead::new("anna@example.com"))
            .await
            .unwrap();
        f.builder
            .build_session(draft("weekend", 245, 1), PaymentPlan::Full, None)
            .await
            .unwrap();
        let lead = f
            .store
            .get_lead_by_email("anna@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lead.status, LeadStatus::BookingStarted);
    }
}
