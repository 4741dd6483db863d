//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Summing float subtotals:                                               │
//! │    0.1 + 0.2 = 0.30000000000000004  → header total drifts              │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units                                      │
//! │    Every price, subtotal and total is an i64 count of cents.           │
//! │    Header total == Σ line subtotals holds exactly.                     │
//! │                                                                         │
//! │  Decimal prices coming over the wire are parsed from their text        │
//! │  ("12.50" → 1250), never through an f64 multiply.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use apotek_core::money::Money;
//!
//! let price = Money::from_cents(10_000); // 100.00
//! let subtotal = price.multiply_quantity(5);
//! assert_eq!(subtotal.cents(), 50_000);
//!
//! let parsed = Money::from_decimal_str("12.5").unwrap();
//! assert_eq!(parsed.cents(), 1250);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: differences between totals can be negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
///
/// ## Where Money is Used
/// ```text
/// InventoryRecord.unit_price ──► TransactionLine.unit_price_snapshot
///                                        │
///                                        ▼  × quantity
///                                TransactionLine.subtotal
///                                        │
///                                        ▼  Σ
///                                TransactionHeader.total_amount
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use apotek_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Parses a decimal amount in major units ("100", "12.5", "0.99").
    ///
    /// ## Rules
    /// - Optional leading `-`
    /// - Digits with at most one `.`
    /// - At most two significant decimal places (`"1.250"` is fine,
    ///   `"1.255"` is not)
    /// - No exponent notation
    ///
    /// ## Example
    /// ```rust
    /// use apotek_core::money::Money;
    ///
    /// assert_eq!(Money::from_decimal_str("100").unwrap().cents(), 10_000);
    /// assert_eq!(Money::from_decimal_str("0.5").unwrap().cents(), 50);
    /// assert!(Money::from_decimal_str("1.999").is_err());
    /// assert!(Money::from_decimal_str("1e3").is_err());
    /// ```
    pub fn from_decimal_str(input: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "price".to_string(),
            reason: reason.to_string(),
        };

        let text = input.trim();
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (major, minor) = digits.split_once('.').unwrap_or((digits, ""));

        if major.is_empty() && minor.is_empty() {
            return Err(invalid("expected a decimal number"));
        }
        if !major.chars().all(|c| c.is_ascii_digit()) || !minor.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("expected a decimal number"));
        }

        let significant = minor.trim_end_matches('0');
        if significant.len() > 2 {
            return Err(invalid("at most two decimal places are allowed"));
        }

        let major_value: i64 = if major.is_empty() {
            0
        } else {
            major.parse().map_err(|_| invalid("value is too large"))?
        };
        let minor_value: i64 = if significant.is_empty() {
            0
        } else {
            format!("{:0<2}", significant)
                .parse()
                .map_err(|_| invalid("expected a decimal number"))?
        };

        let cents = major_value
            .checked_mul(100)
            .and_then(|v| v.checked_add(minor_value))
            .ok_or_else(|| invalid("value is too large"))?;

        Ok(Money(if negative { -cents } else { cents }))
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns the value in major units as `f64`.
    ///
    /// For JSON output only. Never feed the result back into arithmetic.
    #[inline]
    pub fn to_major_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use apotek_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Multiplies money by a quantity, returning `None` on overflow.
    #[inline]
    pub fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        self.0.checked_mul(qty).map(Money)
    }

    /// Whether two amounts differ by at most `tolerance`.
    ///
    /// ## Example
    /// ```rust
    /// use apotek_core::money::Money;
    ///
    /// let one_cent = Money::from_cents(1);
    /// assert!(Money::from_cents(500).within(Money::from_cents(501), one_cent));
    /// assert!(!Money::from_cents(500).within(Money::from_cents(502), one_cent));
    /// ```
    #[inline]
    pub fn within(&self, other: Money, tolerance: Money) -> bool {
        (*self - other).abs() <= tolerance.abs()
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain `major.minor` rendering; the client owns currency formatting.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.cents_part())
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

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "0.00");
    }

    #[test]
    fn test_from_decimal_str_accepts_common_shapes() {
        assert_eq!(Money::from_decimal_str("100").unwrap().cents(), 10_000);
        assert_eq!(Money::from_decimal_str("100.0").unwrap().cents(), 10_000);
        assert_eq!(Money::from_decimal_str("12.5").unwrap().cents(), 1250);
        assert_eq!(Money::from_decimal_str("12.50").unwrap().cents(), 1250);
        assert_eq!(Money::from_decimal_str(".75").unwrap().cents(), 75);
        assert_eq!(Money::from_decimal_str("3.").unwrap().cents(), 300);
        assert_eq!(Money::from_decimal_str(" 15000 ").unwrap().cents(), 1_500_000);
        assert_eq!(Money::from_decimal_str("-5.5").unwrap().cents(), -550);
        assert_eq!(Money::from_decimal_str("1.250").unwrap().cents(), 125);
    }

    #[test]
    fn test_from_decimal_str_rejects_garbage() {
        assert!(Money::from_decimal_str("").is_err());
        assert!(Money::from_decimal_str("-").is_err());
        assert!(Money::from_decimal_str(".").is_err());
        assert!(Money::from_decimal_str("abc").is_err());
        assert!(Money::from_decimal_str("1.2.3").is_err());
        assert!(Money::from_decimal_str("1e3").is_err());
        assert!(Money::from_decimal_str("1.999").is_err());
        assert!(Money::from_decimal_str("99999999999999999999").is_err());
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        let result: Money = a * 3;
        assert_eq!(result.cents(), 3000);
    }

    #[test]
    fn test_sum() {
        let total: Money = [100, 250, 650].into_iter().map(Money::from_cents).sum();
        assert_eq!(total.cents(), 1000);
    }

    #[test]
    fn test_checked_multiply_quantity_overflow() {
        let huge = Money::from_cents(i64::MAX / 2);
        assert!(huge.checked_multiply_quantity(3).is_none());
        assert_eq!(
            Money::from_cents(299).checked_multiply_quantity(3),
            Some(Money::from_cents(897))
        );
    }

    #[test]
    fn test_within_tolerance() {
        let tolerance = Money::from_cents(1);
        assert!(Money::from_cents(300).within(Money::from_cents(300), tolerance));
        assert!(Money::from_cents(300).within(Money::from_cents(299), tolerance));
        assert!(!Money::from_cents(300).within(Money::from_cents(298), tolerance));
    }

    #[test]
    fn test_to_major_f64() {
        assert!((Money::from_cents(10_050).to_major_f64() - 100.5).abs() < f64::EPSILON);
    }
}
