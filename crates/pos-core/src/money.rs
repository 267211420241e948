//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Every monetary value in this crate is an i64 count of cents.        │
//! │    Division loss is explicit and rounded per a configurable policy.    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::types::{RoundingMethod, TaxRate};

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    #[inline]
    pub const fn max(self, other: Self) -> Self {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }

    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Calculates tax on this amount at `rate`, using `method` for the
    /// fractional-cent remainder (spec §4.4.2 / `ROUND_METHOD_FOR_DISCOUNT`).
    ///
    /// `rate` is in basis points (1/10000). The intermediate product is done
    /// in i128 to avoid overflow on large carts.
    pub fn calculate_tax(&self, rate: TaxRate, method: RoundingMethod) -> Money {
        Money::from_cents(round_ratio(self.0, rate.bps() as i64, 10_000, method))
    }

    /// Allocates a proportional share of `self` (typically a subtotal
    /// discount amount) to a line worth `line_amount` out of `total`, using
    /// `method` for the fractional-cent remainder (spec §4.4.2 step 2).
    pub fn allocate_proportional(&self, line_amount: Money, total: Money, method: RoundingMethod) -> Money {
        if total.0 == 0 {
            return Money::zero();
        }
        Money::from_cents(round_ratio(self.0, line_amount.0, total.0, method))
    }
}

/// Computes `round(numerator * factor / divisor)` using the given rounding
/// policy, with an i128 intermediate to avoid overflow.
///
/// This is the one place every discount/tax rounding decision in the crate
/// funnels through, so `ROUND_METHOD_FOR_DISCOUNT` is honored uniformly.
pub fn round_ratio(numerator: i64, factor: i64, divisor: i64, method: RoundingMethod) -> i64 {
    if divisor == 0 {
        return 0;
    }
    let product = numerator as i128 * factor as i128;
    let (quotient, remainder) = (product / divisor as i128, product % divisor as i128);
    let rounded = match method {
        RoundingMethod::Floor => {
            if remainder != 0 && (remainder < 0) != (divisor < 0) {
                quotient - 1
            } else {
                quotient
            }
        }
        RoundingMethod::Ceil => {
            if remainder != 0 && (remainder < 0) == (divisor < 0) {
                quotient + 1
            } else {
                quotient
            }
        }
        RoundingMethod::HalfUp => {
            let half = divisor.unsigned_abs() as i128;
            if remainder.unsigned_abs() * 2 >= half {
                if product >= 0 {
                    quotient + 1
                } else {
                    quotient - 1
                }
            } else {
                quotient
            }
        }
    };
    rounded as i64
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.dollars().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;
    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;
    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;
    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |a, b| a + b)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_cents_and_parts() {
        let m = Money::from_cents(1099);
        assert_eq!(m.cents(), 1099);
        assert_eq!(m.dollars(), 10);
        assert_eq!(m.cents_part(), 99);
    }

    #[test]
    fn display_formats_sign() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "10.99");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-5.50");
    }

    #[test]
    fn tax_half_up() {
        let amount = Money::from_cents(1000);
        let rate = TaxRate::from_bps(825);
        assert_eq!(amount.calculate_tax(rate, RoundingMethod::HalfUp).cents(), 83);
    }

    #[test]
    fn tax_floor_vs_ceil() {
        let amount = Money::from_cents(1000);
        let rate = TaxRate::from_bps(825); // 82.5 cents
        assert_eq!(amount.calculate_tax(rate, RoundingMethod::Floor).cents(), 82);
        assert_eq!(amount.calculate_tax(rate, RoundingMethod::Ceil).cents(), 83);
    }

    #[test]
    fn allocate_proportional_sums_to_total_with_remainder_handling() {
        // 100 split across three lines of 333, 333, 334 (total 1000)
        let discount = Money::from_cents(100);
        let total = Money::from_cents(1000);
        let a = discount.allocate_proportional(Money::from_cents(333), total, RoundingMethod::HalfUp);
        let b = discount.allocate_proportional(Money::from_cents(333), total, RoundingMethod::HalfUp);
        let c = discount.allocate_proportional(Money::from_cents(334), total, RoundingMethod::HalfUp);
        assert_eq!(a.cents() + b.cents() + c.cents(), 100);
    }
}
