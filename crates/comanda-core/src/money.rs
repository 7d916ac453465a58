//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  A tab recomputed on every screen refresh:                              │
//! │    2 × 3.50 + 1 × 5.00 with floats can drift after many refreshes       │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    2 × 350 + 1 × 500 = 1200 cents, every time                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use comanda_core::money::Money;
//!
//! let price = Money::from_cents(350);
//! let total = price
//!     .checked_mul(2)
//!     .and_then(|line| line.checked_add(Money::from_cents(500)));
//! assert_eq!(total, Some(Money::from_cents(1200)));
//! assert_eq!(Money::parse("3,50").unwrap(), price);
//! ```
//!
//! ## Overflow
//! Arithmetic is checked only: there are no `+`/`*` operators on `Money`.
//! Callers turn a `None` into [`CoreError::AmountOverflow`](crate::CoreError)
//! instead of wrapping to a negative total.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in cents.
///
/// ## Design Decisions
/// - **i64 (signed)**: subtraction stays closed, even though stored prices
///   are never negative
/// - **Single field tuple struct**: Zero-cost abstraction over i64
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use comanda_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Parses a decimal amount typed by a user.
    ///
    /// Accepts either `,` or `.` as decimal separator and at most two
    /// decimal digits. Negative amounts are rejected.
    ///
    /// ## Example
    /// ```rust
    /// use comanda_core::money::Money;
    ///
    /// assert_eq!(Money::parse("3,50").unwrap().cents(), 350);
    /// assert_eq!(Money::parse("12").unwrap().cents(), 1200);
    /// assert_eq!(Money::parse("0.5").unwrap().cents(), 50);
    /// assert!(Money::parse("-1").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Money, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "price".to_string(),
            reason: reason.to_string(),
        };

        let text = input.trim();
        if text.is_empty() {
            return Err(ValidationError::Required {
                field: "price".to_string(),
            });
        }
        if text.starts_with('-') {
            return Err(ValidationError::OutOfRange {
                field: "price".to_string(),
                min: 0,
                max: i64::MAX,
            });
        }

        let (major_text, minor_text) = match text.find([',', '.']) {
            Some(pos) => (&text[..pos], &text[pos + 1..]),
            None => (text, ""),
        };

        if minor_text.len() > 2 {
            return Err(invalid("at most two decimal places"));
        }
        if !major_text.chars().all(|c| c.is_ascii_digit())
            || !minor_text.chars().all(|c| c.is_ascii_digit())
            || (major_text.is_empty() && minor_text.is_empty())
        {
            return Err(invalid("expected a number like 3,50"));
        }

        let major: i64 = if major_text.is_empty() {
            0
        } else {
            major_text
                .parse()
                .map_err(|_| invalid("amount is too large"))?
        };
        let minor: i64 = match minor_text.len() {
            0 => 0,
            1 => minor_text.parse::<i64>().map_err(|_| invalid("bad cents"))? * 10,
            _ => minor_text.parse().map_err(|_| invalid("bad cents"))?,
        };

        major
            .checked_mul(100)
            .and_then(|cents| cents.checked_add(minor))
            .map(Money)
            .ok_or_else(|| invalid("amount is too large"))
    }

    /// Returns the value in cents.
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
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
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

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity, `None` on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use comanda_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(350);
    /// assert_eq!(unit_price.checked_mul(2), Some(Money::from_cents(700)));
    /// assert_eq!(Money::from_cents(i64::MAX / 2).checked_mul(3), None);
    /// ```
    #[inline]
    pub const fn checked_mul(self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds two amounts, `None` on overflow.
    #[inline]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Subtracts an amount, `None` on overflow.
    #[inline]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Sums amounts, `None` as soon as the running total overflows.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Self> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, amount| acc.checked_add(amount))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain `major.minor` rendering; screens localize for display.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
