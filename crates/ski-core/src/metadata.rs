//! # Session Metadata
//!
//! A booking is not persisted until its payment is confirmed, so the draft and
//! the quoted amounts ride along in checkout-session metadata and come back in
//! the webhook. Processor metadata values are length-limited, so the serialized
//! draft is split across `booking_0`, `booking_1`, ... keys.

use crate::booking::{BookingDraft, PaymentPlan};
use crate::error::{BookingError, BookingResult};
use crate::money::Money;
use chrono::NaiveDate;
use std::collections::HashMap;
use uuid::Uuid;

/// Longest value the processor accepts, in characters
pub const METADATA_VALUE_LIMIT: usize = 500;

pub const PURPOSE_KEY: &str = "purpose";
pub const PURPOSE_BOOKING: &str = "booking";
pub const PURPOSE_BALANCE: &str = "balance";

const BOOKING_CHUNK_PREFIX: &str = "booking_";
const PAYMENT_MODE_KEY: &str = "payment_mode";
const TOTAL_KEY: &str = "total_amount";
const DEPOSIT_KEY: &str = "deposit_amount";
const REMAINING_KEY: &str = "remaining_amount";
const DUE_DATE_KEY: &str = "balance_due_date";
const COUPON_KEY: &str = "coupon_code";
const BOOKING_ID_KEY: &str = "booking_id";

/// What the checkout builder promised, recovered by the reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingMetadata {
    pub draft: BookingDraft,
    pub payment_mode: PaymentPlan,
    pub total_amount: Money,
    /// Amount charged at checkout (deposit or full total)
    pub charge_amount: Money,
    pub remaining_amount: Money,
    pub balance_due_date: Option<NaiveDate>,
    pub coupon_code: Option<String>,
}

/// Why a checkout session exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPurpose {
    /// First payment of a new booking
    Booking(Box<BookingMetadata>),
    /// Fallback link settling an installment balance
    Balance { booking_id: Uuid },
}

impl BookingMetadata {
    pub fn to_map(&self) -> BookingResult<HashMap<String, String>> {
        let draft_json = serde_json::to_string(&self.draft)?;

        let mut map = HashMap::new();
        map.insert(PURPOSE_KEY.to_string(), PURPOSE_BOOKING.to_string());
        map.insert(
            PAYMENT_MODE_KEY.to_string(),
            self.payment_mode.as_str().to_string(),
        );
        map.insert(TOTAL_KEY.to_string(), self.total_amount.cents().to_string());
        map.insert(DEPOSIT_KEY.to_string(), self.charge_amount.cents().to_string());
        map.insert(
            REMAINING_KEY.to_string(),
            self.remaining_amount.cents().to_string(),
        );
        if let Some(date) = self.balance_due_date {
            map.insert(DUE_DATE_KEY.to_string(), date.to_string());
        }
        if let Some(code) = &self.coupon_code {
            map.insert(COUPON_KEY.to_string(), code.clone());
        }
        for (i, chunk) in split_chars(&draft_json, METADATA_VALUE_LIMIT)
            .into_iter()
            .enumerate()
        {
            map.insert(format!("{}{}", BOOKING_CHUNK_PREFIX, i), chunk);
        }
        Ok(map)
    }

    pub fn from_map(map: &HashMap<String, String>) -> BookingResult<Self> {
        let mut draft_json = String::new();
        let mut i = 0;
        while let Some(chunk) = map.get(&format!("{}{}", BOOKING_CHUNK_PREFIX, i)) {
            draft_json.push_str(chunk);
            i += 1;
        }
        if draft_json.is_empty() {
            return Err(missing("booking draft"));
        }
        let draft: BookingDraft = serde_json::from_str(&draft_json)
            .map_err(|e| BookingError::MissingBookingMetadata(format!("booking draft: {}", e)))?;

        let payment_mode = map
            .get(PAYMENT_MODE_KEY)
            .and_then(|m| PaymentPlan::parse(m))
            .ok_or_else(|| missing(PAYMENT_MODE_KEY))?;

        let balance_due_date = match map.get(DUE_DATE_KEY) {
            Some(raw) => Some(
                raw.parse::<NaiveDate>()
                    .map_err(|_| missing(DUE_DATE_KEY))?,
            ),
            None => None,
        };

        Ok(Self {
            payment_mode,
            total_amount: cents(map, TOTAL_KEY)?,
            charge_amount: cents(map, DEPOSIT_KEY)?,
            remaining_amount: cents(map, REMAINING_KEY)?,
            balance_due_date,
            coupon_code: map.get(COUPON_KEY).cloned(),
            draft,
        })
    }
}

/// Metadata tagging a fallback link with the booking it settles
pub fn balance_metadata(booking_id: Uuid) -> HashMap<String, String> {
    HashMap::from([
        (PURPOSE_KEY.to_string(), PURPOSE_BALANCE.to_string()),
        (BOOKING_ID_KEY.to_string(), booking_id.to_string()),
    ])
}

/// Classify a completed session by its metadata
pub fn session_purpose(map: &HashMap<String, String>) -> BookingResult<SessionPurpose> {
    match map.get(PURPOSE_KEY).map(String::as_str) {
        Some(PURPOSE_BALANCE) => {
            let booking_id = map
                .get(BOOKING_ID_KEY)
                .and_then(|id| Uuid::parse_str(id).ok())
                .ok_or_else(|| missing(BOOKING_ID_KEY))?;
            Ok(SessionPurpose::Balance { booking_id })
        }
        Some(PURPOSE_BOOKING) | None => Ok(SessionPurpose::Booking(Box::new(
            BookingMetadata::from_map(map)?,
        ))),
        Some(other) => Err(BookingError::MissingBookingMetadata(format!(
            "unknown purpose '{}'",
            other
        ))),
    }
}

fn cents(map: &HashMap<String, String>, key: &str) -> BookingResult<Money> {
    map.get(key)
        .and_then(|v| v.parse::<i64>().ok())
        .map(Money::from_cents)
        .ok_or_else(|| missing(key))
}

fn missing(what: &str) -> BookingError {
    BookingError::MissingBookingMetadata(format!("{} missing or malformed", what))
}

fn split_chars(value: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = value.chars().collect();
    chars
        .chunks(limit)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
