//! # Money
//!
//! EUR amounts held in cents. Every booking, charge and transaction uses this
//! type so arithmetic stays exact.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};

/// ISO 4217 code of the only supported currency
pub const CURRENCY: &str = "eur";

/// Amount in euro cents
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Create from cents
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Create from whole euros
    pub const fn from_euros(euros: i64) -> Self {
        Money(euros * 100)
    }

    /// Amount in cents
    pub const fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// `percent`% of this amount, rounded up to the next cent.
    pub fn percent_ceil(&self, percent: u32) -> Money {
        let scaled = self.0 * i64::from(percent);
        Money(scaled.div_euclid(100) + i64::from(scaled.rem_euclid(100) != 0))
    }

    /// This amount `n` times over, e.g. a per-person price for a group
    pub fn times(self, n: u32) -> Money {
        Money(self.0.saturating_mul(i64::from(n)))
    }

    /// Subtraction clamped at zero
    pub fn saturating_sub(self, other: Money) -> Money {
        Money((self.0 - other.0).max(0))
    }

    /// Decimal string without symbol (e.g. "185.00")
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        format!("{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            write!(f, "-€{}", Money(-self.0).to_decimal_string())
        } else {
            write!(f, "€{}", self.to_decimal_string())
        }
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}
