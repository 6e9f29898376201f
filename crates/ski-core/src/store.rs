//! # Booking Store
//!
//! Narrow persistence contract consumed by the core. The storage technology
//! sits behind it; the core never branches on which backend is active.

use crate::booking::{Booking, Guest};
use crate::error::BookingResult;
use crate::lead::{Lead, LeadStatus};
use crate::transaction::PaymentTransaction;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

/// Result of an atomic insert-if-absent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome<T = Booking> {
    Created(T),
    /// A conflicting row already exists; carries the stored one
    AlreadyExists(T),
}

impl<T> CreateOutcome<T> {
    pub fn get(&self) -> &T {
        match self {
            CreateOutcome::Created(v) | CreateOutcome::AlreadyExists(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            CreateOutcome::Created(v) | CreateOutcome::AlreadyExists(v) => v,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }
}

impl CreateOutcome<Booking> {
    pub fn booking(&self) -> &Booking {
        self.get()
    }
}

/// A booking plus the rows written in the same unit of work
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub booking: Booking,
    pub guests: Vec<Guest>,
    pub transactions: Vec<PaymentTransaction>,
}

impl From<Booking> for NewBooking {
    fn from(booking: Booking) -> Self {
        Self {
            booking,
            guests: Vec::new(),
            transactions: Vec::new(),
        }
    }
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert the booking with its guests and transactions unless a booking
    /// with the same `checkout_session_id` exists.
    ///
    /// Must be a single atomic unit (unique constraint + conflict check, one
    /// database transaction), never read-then-write. On `AlreadyExists`
    /// nothing from `record` is written.
    async fn create_booking(&self, record: NewBooking) -> BookingResult<CreateOutcome>;

    async fn get_booking(&self, id: Uuid) -> BookingResult<Option<Booking>>;

    async fn get_booking_by_checkout_session(
        &self,
        session_id: &str,
    ) -> BookingResult<Option<Booking>>;

    /// Replace the stored row. `BookingNotFound` if it does not exist.
    async fn update_booking(&self, booking: &Booking) -> BookingResult<Booking>;

    /// Installment bookings, not paid, with a balance due on or before `date`.
    async fn get_bookings_due_for_payment(&self, date: NaiveDate) -> BookingResult<Vec<Booking>>;

    /// At most one succeeded transaction per booking and payment type. A
    /// second succeeded insert writes nothing and returns the stored row as
    /// `AlreadyExists`. Pending attempts are always inserted.
    async fn create_payment_transaction(
        &self,
        transaction: PaymentTransaction,
    ) -> BookingResult<CreateOutcome<PaymentTransaction>>;

    async fn update_payment_transaction(
        &self,
        transaction: &PaymentTransaction,
    ) -> BookingResult<PaymentTransaction>;

    async fn get_transactions_by_booking_id(
        &self,
        booking_id: Uuid,
    ) -> BookingResult<Vec<PaymentTransaction>>;

    async fn create_guest(&self, guest: Guest) -> BookingResult<Guest>;

    async fn get_guests_by_booking_id(&self, booking_id: Uuid) -> BookingResult<Vec<Guest>>;

    async fn create_lead(&self, lead: Lead) -> BookingResult<Lead>;

    async fn get_lead_by_email(&self, email: &str) -> BookingResult<Option<Lead>>;

    async fn update_lead_status(&self, lead_id: Uuid, status: LeadStatus) -> BookingResult<Lead>;
}

pub type SharedStore = Arc<dyn BookingStore>;

/// Move the lead for `email` forward to `status`, if there is one.
pub async fn advance_lead(
    store: &dyn BookingStore,
    email: &str,
    status: LeadStatus,
) -> BookingResult<Option<Lead>> {
    match store.get_lead_by_email(email).await? {
        Some(lead) if lead.status < status => {
            Ok(Some(store.update_lead_status(lead.id, status).await?))
        }
        other => Ok(other),
    }
}
