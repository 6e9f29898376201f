//! # In-Memory Store
//!
//! [`BookingStore`] backed by process memory. Used for local runs and tests.
//! All tables sit behind one lock, so create-if-absent by checkout session and
//! the one-settlement-per-payment-type rule are atomic.

use crate::booking::{Booking, Guest};
use crate::error::{BookingError, BookingResult};
use crate::lead::{Lead, LeadStatus};
use crate::store::{BookingStore, CreateOutcome, NewBooking};
use crate::transaction::PaymentTransaction;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    bookings: HashMap<Uuid, Booking>,
    /// checkout_session_id -> booking id (unique)
    sessions: HashMap<String, Uuid>,
    transactions: Vec<PaymentTransaction>,
    guests: Vec<Guest>,
    leads: HashMap<Uuid, Lead>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored bookings
    pub async fn booking_count(&self) -> usize {
        self.tables.read().await.bookings.len()
    }
}

impl Tables {
    /// Succeeded row that `transaction` would duplicate
    fn settled(&self, transaction: &PaymentTransaction) -> Option<&PaymentTransaction> {
        if !transaction.is_succeeded() {
            return None;
        }
        self.transactions.iter().find(|t| {
            t.booking_id == transaction.booking_id
                && t.payment_type == transaction.payment_type
                && t.is_succeeded()
        })
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn create_booking(&self, record: NewBooking) -> BookingResult<CreateOutcome> {
        let NewBooking {
            booking,
            guests,
            transactions,
        } = record;
        if guests
            .iter()
            .map(|g| g.booking_id)
            .chain(transactions.iter().map(|t| t.booking_id))
            .any(|id| id != booking.id)
        {
            return Err(BookingError::Persistence(format!(
                "rows for booking {} reference another booking",
                booking.id
            )));
        }

        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .sessions
            .get(&booking.checkout_session_id)
            .and_then(|id| tables.bookings.get(id))
        {
            return Ok(CreateOutcome::AlreadyExists(existing.clone()));
        }
        tables
            .sessions
            .insert(booking.checkout_session_id.clone(), booking.id);
        tables.bookings.insert(booking.id, booking.clone());
        tables.guests.extend(guests);
        tables.transactions.extend(transactions);
        Ok(CreateOutcome::Created(booking))
    }

    async fn get_booking(&self, id: Uuid) -> BookingResult<Option<Booking>> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn get_booking_by_checkout_session(
        &self,
        session_id: &str,
    ) -> BookingResult<Option<Booking>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .get(session_id)
            .and_then(|id| tables.bookings.get(id))
            .cloned())
    }

    async fn update_booking(&self, booking: &Booking) -> BookingResult<Booking> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .bookings
            .get_mut(&booking.id)
            .ok_or_else(|| BookingError::BookingNotFound {
                booking_id: booking.id.to_string(),
            })?;
        *slot = booking.clone();
        Ok(booking.clone())
    }

    async fn get_bookings_due_for_payment(&self, date: NaiveDate) -> BookingResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        let mut due: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| b.is_due_on(date))
            .cloned()
            .collect();
        due.sort_by_key(|b| b.created_at);
        Ok(due)
    }

    async fn create_payment_transaction(
        &self,
        transaction: PaymentTransaction,
    ) -> BookingResult<CreateOutcome<PaymentTransaction>> {
        let mut tables = self.tables.write().await;
        if !tables.bookings.contains_key(&transaction.booking_id) {
            return Err(BookingError::BookingNotFound {
                booking_id: transaction.booking_id.to_string(),
            });
        }
        if let Some(existing) = tables.settled(&transaction) {
            return Ok(CreateOutcome::AlreadyExists(existing.clone()));
        }
        tables.transactions.push(transaction.clone());
        Ok(CreateOutcome::Created(transaction))
    }

    async fn update_payment_transaction(
        &self,
        transaction: &PaymentTransaction,
    ) -> BookingResult<PaymentTransaction> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .transactions
            .iter_mut()
            .find(|t| t.id == transaction.id)
            .ok_or_else(|| {
                BookingError::Persistence(format!("transaction {} not found", transaction.id))
            })?;
        *slot = transaction.clone();
        Ok(transaction.clone())
    }

    async fn get_transactions_by_booking_id(
        &self,
        booking_id: Uuid,
    ) -> BookingResult<Vec<PaymentTransaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .iter()
            .filter(|t| t.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn create_guest(&self, guest: Guest) -> BookingResult<Guest> {
        let mut tables = self.tables.write().await;
        if !tables.bookings.contains_key(&guest.booking_id) {
            return Err(BookingError::BookingNotFound {
                booking_id: guest.booking_id.to_string(),
            });
        }
        tables.guests.push(guest.clone());
        Ok(guest)
    }

    async fn get_guests_by_booking_id(&self, booking_id: Uuid) -> BookingResult<Vec<Guest>> {
        let tables = self.tables.read().await;
        Ok(tables
            .guests
            .iter()
            .filter(|g| g.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn create_lead(&self, lead: Lead) -> BookingResult<Lead> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .leads
            .values()
            .find(|l| l.email.eq_ignore_ascii_case(&lead.email))
        {
            return Ok(existing.clone());
        }
        tables.leads.insert(lead.id, lead.clone());
        Ok(lead)
    }

    async fn get_lead_by_email(&self, email: &str) -> BookingResult<Option<Lead>> {
        let tables = self.tables.read().await;
        Ok(tables
            .leads
            .values()
            .find(|l| l.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn update_lead_status(&self, lead_id: Uuid, status: LeadStatus) -> BookingResult<Lead> {
        let mut tables = self.tables.write().await;
        let lead = tables
            .leads
            .get_mut(&lead_id)
            .ok_or_else(|| BookingError::Persistence(format!("lead {} not found", lead_id)))?;
        lead.status = lead.status.advance(status);
        lead.updated_at = Utc::now();
        Ok(lead.clone())
    }
}
