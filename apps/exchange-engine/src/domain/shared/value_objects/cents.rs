//! Integer-cent money value object.
//!
//! All monetary amounts on the exchange are whole cents. The only
//! rounding rule in the system is banker's rounding, applied to
//! position average-cost updates.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use crate::domain::shared::DomainError;

/// A monetary amount in integer cents.
///
/// Balances may be negative (admin accounts only); prices must be
/// strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cents(i64);

impl Cents {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Create a new amount from whole cents.
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Get the inner cent count.
    #[must_use]
    pub const fn amount(&self) -> i64 {
        self.0
    }

    /// Returns true if this amount is strictly positive.
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns true if this amount is strictly negative.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns true if this amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiply a per-unit price by a quantity of units.
    #[must_use]
    pub const fn times(&self, quantity: u32) -> Self {
        Self(self.0 * quantity as i64)
    }

    /// Saturating subtraction clamped at zero.
    #[must_use]
    pub const fn saturating_sub_floor_zero(&self, rhs: Self) -> Self {
        let diff = self.0 - rhs.0;
        if diff < 0 { Self(0) } else { Self(diff) }
    }

    /// Check the amount is usable as an order price.
    ///
    /// # Errors
    ///
    /// Returns error unless the amount is a strictly positive cent count.
    pub fn validate_for_price(&self) -> Result<(), DomainError> {
        if self.0 <= 0 {
            return Err(DomainError::InvalidValue {
                field: "price_in_cents".to_string(),
                message: "Price must be a positive number of cents".to_string(),
            });
        }
        Ok(())
    }

    /// Quantity-weighted average of two priced lots, in whole cents.
    ///
    /// Used for position average-cost updates on buy fills. Ties round
    /// half to even (banker's rounding). Returns the old average when
    /// the combined quantity is zero.
    #[must_use]
    pub fn weighted_average(old_qty: u32, old_avg: Self, add_qty: u32, add_price: Self) -> Self {
        let total_qty = i128::from(old_qty) + i128::from(add_qty);
        if total_qty == 0 {
            return old_avg;
        }
        let notional = i128::from(old_qty) * i128::from(old_avg.0)
            + i128::from(add_qty) * i128::from(add_price.0);
        Self(round_half_even_div(notional, total_qty))
    }
}

/// Integer division rounding half to even.
///
/// `den` must be positive; callers only divide by quantities.
fn round_half_even_div(num: i128, den: i128) -> i64 {
    debug_assert!(den > 0);
    let quot = num.div_euclid(den);
    let rem = num.rem_euclid(den);
    let twice = rem * 2;
    let rounded = match twice.cmp(&den) {
        Ordering::Less => quot,
        Ordering::Greater => quot + 1,
        // Exactly half: round to the even neighbour.
        Ordering::Equal => {
            if quot % 2 == 0 {
                quot
            } else {
                quot + 1
            }
        }
    };
    rounded as i64
}

impl Default for Cents {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl PartialOrd for Cents {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cents {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl Add for Cents {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Cents {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Cents {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Cents {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Cents {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Cents> for i64 {
    fn from(value: Cents) -> Self {
        value.0
    }
}
