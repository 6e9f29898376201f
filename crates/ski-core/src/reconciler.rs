//! # Webhook Reconciler
//!
//! The only write path that creates bookings. A verified checkout-completed
//! event becomes a booking, its initial transaction and its guests.
//!
//! ```text
//!   verify ─► filter ─► extract metadata ─► derive amounts ─► persist
//!     │          │             │                                │
//!   400        ignored      rejected                     created / duplicate
//!                                                          deferred (store down)
//! ```
//!
//! Idempotency key is the checkout session id. The booking, its initial
//! transaction and its guests are written as one create-if-absent unit, and
//! the store accepts one settled transaction per payment type, so concurrent
//! deliveries never double-record money.

use crate::booking::{Booking, ConfirmedAmounts, Guest, PaymentPlan, PaymentStatus};
use crate::error::{BookingError, BookingResult, ErrorKind};
use crate::event::{CheckoutCompleted, WebhookEvent};
use crate::lead::LeadStatus;
use crate::metadata::{session_purpose, BookingMetadata, SessionPurpose};
use crate::money::Money;
use crate::processor::SharedProcessor;
use crate::store::{advance_lead, CreateOutcome, NewBooking, SharedStore};
use crate::transaction::{PaymentTransaction, PaymentType};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// How an authentic webhook was acknowledged
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebhookAck {
    /// New booking recorded
    Created { booking_id: Uuid },
    /// Booking already existed for this session
    Duplicate { booking_id: Uuid },
    /// Installment balance settled through a fallback link
    BalanceSettled { booking_id: Uuid },
    /// Event type or session state the lifecycle does not act on
    Ignored { reason: String },
    /// Structurally unusable event; retrying will not help
    Rejected { reason: String },
    /// Store failure, surfaced to alerting instead of provider retries
    Deferred { reason: String },
}

impl WebhookAck {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookAck::Created { .. } => "created",
            WebhookAck::Duplicate { .. } => "duplicate",
            WebhookAck::BalanceSettled { .. } => "balance_settled",
            WebhookAck::Ignored { .. } => "ignored",
            WebhookAck::Rejected { .. } => "rejected",
            WebhookAck::Deferred { .. } => "deferred",
        }
    }

    pub fn booking_id(&self) -> Option<Uuid> {
        match self {
            WebhookAck::Created { booking_id }
            | WebhookAck::Duplicate { booking_id }
            | WebhookAck::BalanceSettled { booking_id } => Some(*booking_id),
            _ => None,
        }
    }
}

pub struct WebhookReconciler {
    processor: SharedProcessor,
    store: SharedStore,
}

impl WebhookReconciler {
    pub fn new(processor: SharedProcessor, store: SharedStore) -> Self {
        Self { processor, store }
    }

    /// Verify and apply one webhook delivery.
    ///
    /// `Err` only for signature or decode failures; everything after
    /// verification is acknowledged.
    #[instrument(skip_all)]
    pub async fn handle(&self, payload: &[u8], signature: &str) -> BookingResult<WebhookAck> {
        let event = match self.processor.verify_webhook(payload, signature).await {
            Ok(event) => event,
            Err(e) => {
                match &e {
                    BookingError::InvalidSignature(_) => {
                        warn!(security = true, error = %e, "webhook signature rejected")
                    }
                    _ => warn!(error = %e, "webhook payload undecodable"),
                }
                return Err(e);
            }
        };

        let data = match event {
            WebhookEvent::CheckoutCompleted(data) => data,
            WebhookEvent::Unknown {
                event_id,
                event_type,
            } => {
                info!(%event_id, %event_type, "webhook event ignored");
                return Ok(WebhookAck::Ignored {
                    reason: format!("unhandled event type {}", event_type),
                });
            }
        };

        if !data.paid {
            info!(session_id = %data.session_id, "checkout completed without payment");
            return Ok(WebhookAck::Ignored {
                reason: "session not paid".to_string(),
            });
        }

        let purpose = match session_purpose(&data.metadata) {
            Ok(purpose) => purpose,
            Err(e) => {
                error!(session_id = %data.session_id, error = %e, "checkout carried no booking metadata");
                return Ok(WebhookAck::Rejected {
                    reason: e.to_string(),
                });
            }
        };

        let result = match purpose {
            SessionPurpose::Booking(meta) => self.record_booking(&data, *meta).await,
            SessionPurpose::Balance { booking_id } => self.settle_balance(&data, booking_id).await,
        };

        match result {
            Ok(ack) => Ok(ack),
            Err(e) if e.kind() == ErrorKind::Persistence => {
                error!(
                    alert = true,
                    session_id = %data.session_id,
                    error = %e,
                    "webhook could not be persisted"
                );
                Ok(WebhookAck::Deferred {
                    reason: e.to_string(),
                })
            }
            Err(e) => {
                error!(session_id = %data.session_id, error = %e, "webhook rejected");
                Ok(WebhookAck::Rejected {
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn record_booking(
        &self,
        data: &CheckoutCompleted,
        meta: BookingMetadata,
    ) -> BookingResult<WebhookAck> {
        let plan = meta.payment_mode;
        let collected = data.amount_total.unwrap_or(meta.charge_amount);
        if collected > meta.charge_amount {
            warn!(
                session_id = %data.session_id,
                collected = %collected,
                quoted = %meta.charge_amount,
                "collected more than quoted"
            );
        }
        let discount = meta.charge_amount.saturating_sub(collected);
        let remaining = match plan {
            PaymentPlan::Full => Money::ZERO,
            PaymentPlan::Installment => meta.remaining_amount,
        };

        let mut booking = Booking::confirmed(
            &meta.draft,
            plan,
            ConfirmedAmounts {
                total: meta.total_amount.saturating_sub(discount),
                discount,
                remaining,
                balance_due_date: meta.balance_due_date,
            },
            data.session_id.clone(),
        );
        booking.coupon_code = meta.coupon_code.clone();
        booking.processor_customer_id = data.customer_id.clone();
        booking.payment_method_id = data.payment_method_id.clone();
        if plan == PaymentPlan::Installment && booking.payment_method_id.is_none() {
            booking.payment_method_id = self.lookup_payment_method(data).await;
        }

        let initial_type = match plan {
            PaymentPlan::Full => PaymentType::Full,
            PaymentPlan::Installment => PaymentType::Deposit,
        };

        let record = NewBooking {
            guests: meta
                .draft
                .guests
                .iter()
                .map(|guest| Guest::from_draft(booking.id, guest))
                .collect(),
            transactions: vec![self.initial_transaction(
                booking.id,
                data,
                initial_type,
                collected,
            )],
            booking,
        };

        match self.store.create_booking(record).await? {
            CreateOutcome::Created(booking) => {
                self.advance_lead(&booking.email).await;

                info!(
                    booking_id = %booking.id,
                    session_id = %data.session_id,
                    amount = %collected,
                    payment_plan = %plan,
                    "booking created"
                );
                Ok(WebhookAck::Created {
                    booking_id: booking.id,
                })
            }
            CreateOutcome::AlreadyExists(booking) => {
                self.repair(&booking, data, &meta, initial_type, collected)
                    .await?;
                info!(booking_id = %booking.id, session_id = %data.session_id, "duplicate delivery");
                Ok(WebhookAck::Duplicate {
                    booking_id: booking.id,
                })
            }
        }
    }

    /// Fill in rows a store without transactional writes may have lost
    async fn repair(
        &self,
        booking: &Booking,
        data: &CheckoutCompleted,
        meta: &BookingMetadata,
        initial_type: PaymentType,
        collected: Money,
    ) -> BookingResult<()> {
        let recorded = self
            .store
            .create_payment_transaction(self.initial_transaction(
                booking.id,
                data,
                initial_type,
                collected,
            ))
            .await?;
        if recorded.is_created() {
            warn!(booking_id = %booking.id, "initial transaction was missing, recorded it");
        }

        let stored = self.store.get_guests_by_booking_id(booking.id).await?.len();
        let missing = meta.draft.guests.len().saturating_sub(stored);
        if missing > 0 {
            warn!(booking_id = %booking.id, missing, "guests missing, recording them");
            // guests are written in draft order, so the stored ones are a prefix
            for guest in meta.draft.guests.iter().skip(stored) {
                self.store
                    .create_guest(Guest::from_draft(booking.id, guest))
                    .await?;
            }
        }
        Ok(())
    }

    async fn settle_balance(
        &self,
        data: &CheckoutCompleted,
        booking_id: Uuid,
    ) -> BookingResult<WebhookAck> {
        let mut booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::BookingNotFound {
                booking_id: booking_id.to_string(),
            })?;

        let transactions = self.store.get_transactions_by_booking_id(booking_id).await?;
        let already_recorded = data.payment_intent_id.is_some()
            && transactions.iter().any(|t| {
                t.payment_type == PaymentType::Balance
                    && t.is_succeeded()
                    && t.provider_payment_id == data.payment_intent_id
            });
        if already_recorded {
            if booking.payment_status != PaymentStatus::Paid {
                booking.mark_balance_paid()?;
                self.store.update_booking(&booking).await?;
            }
            return Ok(WebhookAck::Duplicate { booking_id });
        }

        let remaining = booking.collectable_balance().map_err(|e| {
            error!(alert = true, %booking_id, "balance link paid for a settled booking");
            e
        })?;
        let amount = data.amount_total.unwrap_or(remaining);

        let recorded = self
            .store
            .create_payment_transaction(
                PaymentTransaction::succeeded(
                    booking_id,
                    PaymentType::Balance,
                    amount,
                    self.processor.provider_name(),
                    data.payment_intent_id.clone(),
                )
                .with_response(data.raw.clone()),
            )
            .await?;
        if let CreateOutcome::AlreadyExists(stored) = recorded {
            if stored.provider_payment_id != data.payment_intent_id {
                error!(
                    alert = true,
                    %booking_id,
                    recorded = ?stored.provider_payment_id,
                    received = ?data.payment_intent_id,
                    "balance paid twice"
                );
                return Err(BookingError::BusinessRule(format!(
                    "balance for booking {} was already collected",
                    booking_id
                )));
            }
            info!(%booking_id, "balance recorded by a concurrent delivery");
            return Ok(WebhookAck::Duplicate { booking_id });
        }
        booking.mark_balance_paid()?;
        self.store.update_booking(&booking).await?;

        info!(%booking_id, amount = %amount, "balance settled through payment link");
        Ok(WebhookAck::BalanceSettled { booking_id })
    }

    fn initial_transaction(
        &self,
        booking_id: Uuid,
        data: &CheckoutCompleted,
        payment_type: PaymentType,
        amount: Money,
    ) -> PaymentTransaction {
        PaymentTransaction::succeeded(
            booking_id,
            payment_type,
            amount,
            self.processor.provider_name(),
            data.payment_intent_id.clone(),
        )
        .with_response(data.raw.clone())
    }

    async fn lookup_payment_method(&self, data: &CheckoutCompleted) -> Option<String> {
        let intent_id = data.payment_intent_id.as_deref()?;
        match self.processor.payment_method_for_intent(intent_id).await {
            Ok(method) => method,
            Err(e) => {
                warn!(session_id = %data.session_id, error = %e, "payment method lookup failed");
                None
            }
        }
    }

    async fn advance_lead(&self, email: &str) {
        if let Err(e) = advance_lead(self.store.as_ref(), email, LeadStatus::BookingConfirmed).await
        {
            warn!(error = %e, "could not advance lead");
        }
    }
}
