//! Monetary amounts.
//!
//! Amounts are exact decimals; floating point never touches money.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::value_object::ValueObject;

/// A currency-agnostic monetary amount.
///
/// Negative amounts are representable; callers decide whether they are
/// meaningful (a voided return item can carry a zero or negative amount).
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Scale by a dimensionless factor (e.g. a proportion).
    pub fn checked_mul(&self, factor: Decimal) -> Option<Money> {
        self.0.checked_mul(factor).map(Money)
    }

    /// Ratio of two amounts; `None` when `other` is zero or on overflow.
    pub fn checked_div(&self, other: Money) -> Option<Decimal> {
        self.0.checked_div(other.0)
    }

    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Sum of `amounts`; `None` on overflow.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |total, amount| total.checked_add(amount))
    }

    /// Round half away from zero to `scale` fractional digits.
    pub fn round_dp(&self, scale: u32) -> Money {
        Money(self.0.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero))
    }
}

impl ValueObject for Money {}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
