//! # ski-core
//!
//! Booking payment lifecycle for powder-pay ski trips.
//!
//! This crate provides:
//! - `CouponValidator` for processor-owned promotion codes with a group-size gate
//! - `CheckoutBuilder` turning a client-held draft into a hosted checkout session
//! - `WebhookReconciler`, the only path that creates bookings
//! - `InstallmentScheduler` collecting balances off-session on their due date
//! - `PaymentProcessor` and `BookingStore` traits at the external seams
//! - `BookingError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use ski_core::{BookingPolicy, CheckoutBuilder, PaymentPlan};
//!
//! // Open a session; the booking is written later, by the webhook
//! let redirect = builder.build_session(draft, PaymentPlan::Installment, Some("4ORMORE")).await?;
//!
//! // Redirect the browser to redirect.redirect_url
//!
//! // Daily, from cron or the operator endpoint
//! let report = scheduler.process_due(today).await?;
//! ```

pub mod booking;
pub mod checkout;
pub mod coupon;
pub mod error;
pub mod event;
pub mod lead;
pub mod memory;
pub mod metadata;
pub mod money;
pub mod package;
pub mod policy;
pub mod processor;
pub mod reconciler;
pub mod scheduler;
pub mod store;
pub mod transaction;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-exports for convenience
pub use booking::{
    Booking, BookingDraft, ConfirmedAmounts, Guest, GuestDraft, InstallmentStatus, LegStatus,
    PaymentPlan, PaymentStatus,
};
pub use checkout::{CheckoutBuilder, CheckoutRedirect};
pub use coupon::{CouponResult, CouponValidator};
pub use error::{BookingError, BookingResult, ErrorKind};
pub use event::{CheckoutCompleted, WebhookEvent};
pub use lead::{Lead, LeadStatus};
pub use memory::MemoryStore;
pub use metadata::{balance_metadata, session_purpose, BookingMetadata, SessionPurpose};
pub use money::{Money, CURRENCY};
pub use package::{Package, PackageCatalog};
pub use policy::BookingPolicy;
pub use processor::{
    ChargeOutcome, ChargeResult, CheckoutRequest, CheckoutSession, CheckoutUrls, Coupon, LineItem,
    OffSessionCharge, PaymentLink, PaymentLinkRequest, PaymentProcessor, PromotionCode,
    SharedProcessor,
};
pub use reconciler::{WebhookAck, WebhookReconciler};
pub use scheduler::{BalanceBatchReport, BalanceFailure, InstallmentScheduler};
pub use store::{advance_lead, BookingStore, CreateOutcome, NewBooking, SharedStore};
pub use transaction::{collected_total, PaymentTransaction, PaymentType, TransactionStatus};
