//! # Money
//!
//! Amounts in minor currency units (cents). Arithmetic is checked: an
//! overflow is a validation failure, never a wrapped total.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// An amount in minor currency units.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Create a non-negative amount.
    pub fn from_minor(minor: i64) -> Result<Self, ValidationError> {
        if minor < 0 {
            return Err(ValidationError::NegativeAmount(minor));
        }
        Ok(Self(minor))
    }

    pub fn minor_units(&self) -> i64 {
        self.0
    }

    /// Checked addition.
    pub fn checked_add(self, other: Money) -> Result<Money, ValidationError> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or(ValidationError::AmountOverflow)
    }

    /// Checked multiplication by a quantity.
    pub fn checked_mul(self, quantity: u32) -> Result<Money, ValidationError> {
        self.0
            .checked_mul(i64::from(quantity))
            .map(Money)
            .ok_or(ValidationError::AmountOverflow)
    }

    /// Sum an iterator of amounts, failing on overflow.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Result<Money, ValidationError> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, amount| acc.checked_add(amount))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}
