//! # ski-stripe
//!
//! Stripe implementation of `ski_core::PaymentProcessor`.
//!
//! - Checkout Sessions for the deposit or full payment, keeping the card for
//!   installment bookings
//! - Off-session PaymentIntents for due balances
//! - Payment Links as the fallback when a balance charge fails
//! - Promotion code lookup
//! - `Stripe-Signature` verification for webhooks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ski_stripe::StripeProcessor;
//!
//! // STRIPE_SECRET_KEY, STRIPE_PUBLISHABLE_KEY, STRIPE_WEBHOOK_SECRET
//! let processor = Arc::new(StripeProcessor::from_env()?);
//!
//! // In the webhook endpoint, with the raw body:
//! let ack = reconciler.handle(&body, signature_header).await?;
//! ```

pub mod charges;
pub mod checkout;
pub mod client;
pub mod config;
pub mod coupons;
pub mod links;
pub mod processor;
pub mod webhook;

// Re-exports
pub use client::{StripeClient, StripeErrorBody, StripeFailure};
pub use config::StripeConfig;
pub use processor::StripeProcessor;
pub use webhook::{parse_event, signature_header, verify_signature, CHECKOUT_COMPLETED_EVENTS};
