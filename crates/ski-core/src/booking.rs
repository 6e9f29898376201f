//! # Booking Types
//!
//! Drafts (client-held, never persisted until paid), confirmed bookings and
//! their guests.
//!
//! ```text
//!   draft ──webhook──► paid                       (full)
//!   draft ──webhook──► partial ──balance──► paid  (installment)
//! ```
//!
//! `failed` is terminal; a new checkout creates a new booking.

use crate::error::{BookingError, BookingResult};
use crate::money::Money;
use crate::processor::PaymentLink;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the customer pays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPlan {
    /// Whole amount at checkout
    Full,
    /// Deposit at checkout, balance collected off-session on the due date
    Installment,
}

impl PaymentPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPlan::Full => "full",
            PaymentPlan::Installment => "installment",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "full" => Some(PaymentPlan::Full),
            "installment" => Some(PaymentPlan::Installment),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    /// Deposit collected, balance outstanding
    Partial,
    Paid,
    Failed,
}

/// Status of one installment leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegStatus {
    Pending,
    Paid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentStatus {
    pub deposit: LegStatus,
    pub balance: LegStatus,
    pub due_date: NaiveDate,
}

/// A guest as entered in the booking form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestDraft {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
}

/// Client-held booking data, carried in checkout metadata until paid.
///
/// `number_of_guests` counts everyone travelling, lead booker included, and
/// `guests` lists exactly that many people with the lead booker first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDraft {
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub package_id: String,
    pub package_name: String,
    pub package_price: Money,
    pub dates: String,
    pub number_of_guests: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_type: Option<String>,
    #[serde(default)]
    pub add_ons: Vec<String>,
    pub total_amount: Money,
    #[serde(default)]
    pub guests: Vec<GuestDraft>,
}

impl BookingDraft {
    /// Check the draft is complete enough to take payment for
    pub fn validate(&self) -> BookingResult<()> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(BookingError::Validation(
                "A valid email address is required".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(BookingError::Validation("Name is required".to_string()));
        }
        if self.package_id.trim().is_empty() {
            return Err(BookingError::Validation("Package is required".to_string()));
        }
        if !self.total_amount.is_positive() {
            return Err(BookingError::Validation(
                "Total amount must be positive".to_string(),
            ));
        }
        if self.number_of_guests == 0 {
            return Err(BookingError::Validation(
                "At least one guest is required".to_string(),
            ));
        }
        if self.guests.len() != self.number_of_guests as usize {
            return Err(BookingError::Validation(format!(
                "Expected {} guests (lead booker included), got {}",
                self.number_of_guests,
                self.guests.len()
            )));
        }
        if let Some(i) = self.guests.iter().position(|g| g.name.trim().is_empty()) {
            return Err(BookingError::Validation(format!(
                "Guest {} has no name",
                i + 1
            )));
        }
        Ok(())
    }
}

/// Amounts settled when the first payment is confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedAmounts {
    /// Amount owed after any processor-side discount
    pub total: Money,
    pub discount: Money,
    /// Outstanding balance (zero for full plans)
    pub remaining: Money,
    pub balance_due_date: Option<NaiveDate>,
}

/// A confirmed reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub package_id: String,
    pub package_name: String,
    pub package_price: Money,
    pub dates: String,
    pub number_of_guests: u32,
    pub room_type: Option<String>,
    pub add_ons: Vec<String>,
    pub total_amount: Money,
    pub discount_amount: Money,
    pub coupon_code: Option<String>,
    pub payment_plan: PaymentPlan,
    pub payment_status: PaymentStatus,
    /// Present only for installment plans
    pub remaining_amount: Option<Money>,
    /// Present only for installment plans
    pub balance_due_date: Option<NaiveDate>,
    pub processor_customer_id: Option<String>,
    pub payment_method_id: Option<String>,
    /// Idempotency key of the creating webhook
    pub checkout_session_id: String,
    pub installment_status: Option<InstallmentStatus>,
    /// Last failed balance collection attempt
    pub balance_failure: Option<String>,
    /// Hosted link issued for the outstanding balance, reused until paid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance_link: Option<PaymentLink>,
    pub flight_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Materialize a booking whose first payment has been confirmed.
    pub fn confirmed(
        draft: &BookingDraft,
        plan: PaymentPlan,
        amounts: ConfirmedAmounts,
        checkout_session_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        let (payment_status, remaining_amount, balance_due_date, installment_status) = match plan
        {
            PaymentPlan::Full => (PaymentStatus::Paid, None, None, None),
            PaymentPlan::Installment => {
                let status = amounts.balance_due_date.map(|due_date| InstallmentStatus {
                    deposit: LegStatus::Paid,
                    balance: if amounts.remaining.is_zero() {
                        LegStatus::Paid
                    } else {
                        LegStatus::Pending
                    },
                    due_date,
                });
                let payment_status = if amounts.remaining.is_zero() {
                    PaymentStatus::Paid
                } else {
                    PaymentStatus::Partial
                };
                (
                    payment_status,
                    Some(amounts.remaining),
                    amounts.balance_due_date,
                    status,
                )
            }
        };

        Self {
            id: Uuid::new_v4(),
            email: draft.email.trim().to_string(),
            name: draft.name.trim().to_string(),
            phone: draft.phone.clone(),
            package_id: draft.package_id.clone(),
            package_name: draft.package_name.clone(),
            package_price: draft.package_price,
            dates: draft.dates.clone(),
            number_of_guests: draft.number_of_guests,
            room_type: draft.room_type.clone(),
            add_ons: draft.add_ons.clone(),
            total_amount: amounts.total,
            discount_amount: amounts.discount,
            coupon_code: None,
            payment_plan: plan,
            payment_status,
            remaining_amount,
            balance_due_date,
            processor_customer_id: None,
            payment_method_id: None,
            checkout_session_id: checkout_session_id.into(),
            installment_status,
            balance_failure: None,
            balance_link: None,
            flight_number: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sum that should have been collected so far
    pub fn paid_amount(&self) -> Money {
        self.total_amount - self.remaining_amount.unwrap_or(Money::ZERO)
    }

    /// Balance that may be collected now, or why it may not.
    pub fn collectable_balance(&self) -> BookingResult<Money> {
        if self.payment_plan != PaymentPlan::Installment {
            return Err(BookingError::BusinessRule(format!(
                "Booking {} is not an installment plan",
                self.id
            )));
        }
        match self.payment_status {
            PaymentStatus::Paid => {
                return Err(BookingError::BusinessRule(format!(
                    "Balance for booking {} is already paid",
                    self.id
                )))
            }
            PaymentStatus::Failed => {
                return Err(BookingError::BusinessRule(format!(
                    "Booking {} has failed",
                    self.id
                )))
            }
            PaymentStatus::Pending | PaymentStatus::Partial => {}
        }
        match self.remaining_amount {
            Some(amount) if amount.is_positive() => Ok(amount),
            _ => Err(BookingError::BusinessRule(format!(
                "Booking {} has no outstanding balance",
                self.id
            ))),
        }
    }

    /// Transition partial → paid once the balance has been collected.
    pub fn mark_balance_paid(&mut self) -> BookingResult<()> {
        self.collectable_balance()?;
        self.payment_status = PaymentStatus::Paid;
        self.remaining_amount = Some(Money::ZERO);
        if let Some(status) = self.installment_status.as_mut() {
            status.balance = LegStatus::Paid;
        }
        self.balance_failure = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Annotate a failed balance collection. The booking stays `partial`.
    pub fn note_balance_failure(&mut self, reason: impl Into<String>) {
        self.balance_failure = Some(reason.into());
        self.updated_at = Utc::now();
    }

    /// Due for balance collection on `date`
    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        self.payment_plan == PaymentPlan::Installment
            && self.payment_status != PaymentStatus::Paid
            && self.payment_status != PaymentStatus::Failed
            && self.balance_due_date.map(|due| due <= date).unwrap_or(false)
    }
}

/// One person on a booking, lead booker included
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

impl Guest {
    pub fn from_draft(booking_id: Uuid, draft: &GuestDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            name: draft.name.trim().to_string(),
            email: draft.email.clone(),
            phone: draft.phone.clone(),
            date_of_birth: draft.date_of_birth,
        }
    }
}
