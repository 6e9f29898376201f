//! # Booking Policy
//!
//! Fixed business values, injected into each component at construction.

use crate::money::Money;
use chrono::NaiveDate;
use std::time::Duration;

/// Deposit share of the total under an installment plan
pub const DEFAULT_DEPOSIT_PERCENT: u32 = 30;

/// Code of the group discount
pub const DEFAULT_GROUP_COUPON_CODE: &str = "4ORMORE";

/// Smallest group allowed to use the group discount
pub const DEFAULT_GROUP_MIN_SIZE: u32 = 4;

/// Per-booking bound on an off-session charge attempt
pub const DEFAULT_CHARGE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct BookingPolicy {
    /// Deposit percentage, rounded up to the next cent
    pub deposit_percent: u32,
    /// Group discount code, matched case-insensitively
    pub group_coupon_code: String,
    pub group_min_size: u32,
    /// Used when a package has no balance due date of its own
    pub default_balance_due_date: Option<NaiveDate>,
    pub charge_timeout: Duration,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            deposit_percent: DEFAULT_DEPOSIT_PERCENT,
            group_coupon_code: DEFAULT_GROUP_COUPON_CODE.to_string(),
            group_min_size: DEFAULT_GROUP_MIN_SIZE,
            default_balance_due_date: None,
            charge_timeout: DEFAULT_CHARGE_TIMEOUT,
        }
    }
}

impl BookingPolicy {
    /// Builder: set fallback balance due date
    pub fn with_default_balance_due_date(mut self, date: NaiveDate) -> Self {
        self.default_balance_due_date = Some(date);
        self
    }

    /// Builder: set charge timeout
    pub fn with_charge_timeout(mut self, timeout: Duration) -> Self {
        self.charge_timeout = timeout;
        self
    }

    /// Upfront deposit for an installment plan
    pub fn deposit_for(&self, total: Money) -> Money {
        total.percent_ceil(self.deposit_percent)
    }

    pub fn is_group_code(&self, code: &str) -> bool {
        code.trim().eq_ignore_ascii_case(&self.group_coupon_code)
    }
}
