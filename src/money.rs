// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Exact fixed-point money.
//!
//! Amounts are carried as [`rust_decimal::Decimal`] and only rounded at the
//! boundaries where a value becomes a posted amount. Serialized as a decimal
//! string so nothing is lost on the way to JSON.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minor units for the default currency (cents).
pub const DEFAULT_MINOR_UNITS: u32 = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Invalid amount '{0}'")]
    Parse(String),
    #[error("Amount {amount} has more than {minor_units} decimal places")]
    ExcessPrecision { amount: Decimal, minor_units: u32 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Parses a decimal string and rejects anything finer than `minor_units`.
    /// Never rounds.
    pub fn parse(s: &str, minor_units: u32) -> Result<Self, MoneyError> {
        let trimmed = s.trim();
        let value = Decimal::from_str(trimmed).map_err(|_| MoneyError::Parse(trimmed.to_string()))?;
        let money = Self(value);
        money.check_precision(minor_units)?;
        Ok(money)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// Largest magnitude a single posted amount may have (one quadrillion).
    /// Sums of bounded amounts stay far inside `Decimal`'s range.
    pub fn limit() -> Money {
        Money(Decimal::new(1_000_000_000_000_000, 0))
    }

    pub fn within_limit(&self) -> bool {
        self.0.abs() <= Self::limit().0
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Product with a rate or share. Unrounded.
    pub fn checked_mul(self, factor: Decimal) -> Option<Money> {
        self.0.checked_mul(factor).map(Money)
    }

    /// True when the value is representable in `minor_units` without rounding.
    pub fn fits_minor_units(&self, minor_units: u32) -> bool {
        self.0.normalize().scale() <= minor_units
    }

    pub fn check_precision(&self, minor_units: u32) -> Result<(), MoneyError> {
        if self.fits_minor_units(minor_units) {
            Ok(())
        } else {
            Err(MoneyError::ExcessPrecision {
                amount: self.0,
                minor_units,
            })
        }
    }

    /// Half-away-from-zero rounding, used where a computed value is posted.
    pub fn round(value: Decimal, minor_units: u32) -> Self {
        Self(value.round_dp_with_strategy(minor_units, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Rounds toward positive infinity; a payment rounded this way never under-pays.
    pub fn round_up(value: Decimal, minor_units: u32) -> Self {
        Self(value.round_dp_with_strategy(minor_units, RoundingStrategy::ToPositiveInfinity))
    }

    /// Formats with exactly `minor_units` decimals.
    pub fn display(&self, minor_units: u32) -> String {
        format!("{:.*}", minor_units as usize, self.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s, DEFAULT_MINOR_UNITS)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
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

impl Neg for Money {
    type Output = Money;
    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + *m)
    }
}
