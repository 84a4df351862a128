//! Money types with precise decimal arithmetic
//!
//! This module provides a type-safe representation of monetary values
//! using rust_decimal for precise calculations without floating-point errors.
//! The bookkeeping core runs in a single organization currency, so `Money`
//! carries no currency code; amounts are kept at two decimal places.
//!
//! Every balance comparison in the ledger goes through the helpers here so
//! that the 0.01 tolerance is applied identically by the journal engine, the
//! allocation engine and the retention processor.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use thiserror::Error;

/// Decimal places kept for currency amounts
pub const MONEY_DECIMAL_PLACES: u32 = 2;

/// Largest difference still treated as equal when comparing balances
pub const TOLERANCE: Money = Money(dec!(0.01));

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Division by zero")]
    DivisionByZero,
}

/// A monetary amount in the organization currency
///
/// Deserializing goes through [`Money::new`], so amounts read from a
/// request are rounded the same way as computed ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// The zero amount
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Creates a new Money value rounded half away from zero to currency
    /// precision
    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp_with_strategy(
            MONEY_DECIMAL_PLACES,
            RoundingStrategy::MidpointAwayFromZero,
        ))
    }

    /// Creates Money from an integer amount in minor units (cents)
    pub fn from_minor(minor_units: i64) -> Self {
        Self(Decimal::new(minor_units, MONEY_DECIMAL_PLACES))
    }

    /// Creates a zero amount
    pub fn zero() -> Self {
        Self::ZERO
    }

    /// Returns the amount
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is strictly positive
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Returns true if the amount is strictly negative
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Returns the absolute value
    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// Returns the amount floored at zero
    pub fn clamp_non_negative(&self) -> Self {
        if self.is_negative() {
            Self::ZERO
        } else {
            *self
        }
    }

    /// Returns true when the two amounts differ by at most [`TOLERANCE`]
    pub fn approx_eq(&self, other: &Money) -> bool {
        (self.0 - other.0).abs() <= TOLERANCE.0
    }

    /// Returns true when `self` is larger than `limit` by more than [`TOLERANCE`]
    pub fn exceeds(&self, limit: &Money) -> bool {
        self.0 - limit.0 > TOLERANCE.0
    }

    /// Returns true when the amount is within [`TOLERANCE`] of zero
    pub fn is_negligible(&self) -> bool {
        self.0.abs() <= TOLERANCE.0
    }

    /// Multiplies by a scalar, rounding to currency precision
    pub fn multiply(&self, factor: Decimal) -> Self {
        Self::new(self.0 * factor)
    }

    /// Divides by a scalar
    pub fn divide(&self, divisor: Decimal) -> Result<Self, MoneyError> {
        if divisor.is_zero() {
            return Err(MoneyError::DivisionByZero);
        }
        Ok(Self::new(self.0 / divisor))
    }

    /// Parses a decimal string into Money
    pub fn parse(value: &str) -> Result<Self, MoneyError> {
        value
            .trim()
            .parse::<Decimal>()
            .map(Self::new)
            .map_err(|_| MoneyError::InvalidAmount(value.to_string()))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Decimal {
        money.0
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        <Decimal as Deserialize>::deserialize(deserializer).map(Money::new)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + *m)
    }
}

/// A percentage rate (e.g. a retention rate of 3%)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate {
    /// The rate expressed as a percentage (3 for 3%)
    percentage: Decimal,
}

impl Rate {
    /// Creates a rate from a percentage (e.g., 3.0 for 3%)
    pub fn from_percentage(percentage: Decimal) -> Self {
        Self { percentage }
    }

    /// Returns the rate as a percentage
    pub fn as_percentage(&self) -> Decimal {
        self.percentage
    }

    /// Returns the rate as a fraction (0.03 for 3%)
    pub fn as_decimal(&self) -> Decimal {
        self.percentage / dec!(100)
    }

    /// Applies this rate to a money amount: `amount * percentage / 100`
    pub fn apply(&self, money: &Money) -> Money {
        Money::new(money.amount() * self.percentage / dec!(100))
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percentage.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_creation_rounds_to_cents() {
        let m = Money::new(dec!(100.456));
        assert_eq!(m.amount(), dec!(100.46));
    }

    #[test]
    fn test_money_from_minor() {
        let m = Money::from_minor(10050);
        assert_eq!(m.amount(), dec!(100.50));
    }

    #[test]
    fn test_tolerance_comparisons() {
        let a = Money::new(dec!(100.00));
        let b = Money::new(dec!(100.01));
        let c = Money::new(dec!(100.02));

        assert!(a.approx_eq(&b));
        assert!(!a.approx_eq(&c));
        assert!(!b.exceeds(&a));
        assert!(c.exceeds(&a));
    }

    #[test]
    fn test_rate_application() {
        let rate = Rate::from_percentage(dec!(3));
        let base = Money::new(dec!(1000.00));

        assert_eq!(rate.apply(&base).amount(), dec!(30.00));
    }

    #[test]
    fn test_rate_application_rounds() {
        let rate = Rate::from_percentage(dec!(2.5));
        let base = Money::new(dec!(10.01));

        assert_eq!(rate.apply(&base).amount(), dec!(0.25));
    }

    #[test]
    fn test_half_cent_rounds_away_from_zero() {
        assert_eq!(Money::new(dec!(0.125)).amount(), dec!(0.13));
        assert_eq!(Money::new(dec!(-0.125)).amount(), dec!(-0.13));
        let rate = Rate::from_percentage(dec!(12.5));
        assert_eq!(rate.apply(&Money::new(dec!(1))).amount(), dec!(0.13));
    }
}
