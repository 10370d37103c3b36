//! Money amounts in minor currency units.

use std::borrow::Cow;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::value_object::ValueObject;

/// An amount of money in the smallest currency unit (poisha, cents, ...).
///
/// Serialized as a bare integer. Amounts may go negative only transiently in
/// arithmetic; domain types validate the sign of what they store.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(amount: i64) -> Self {
        Self(amount)
    }

    /// Build from whole major units (e.g. taka, dollars).
    pub const fn from_major(amount: i64) -> Self {
        Self(amount * 100)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_mul(self, qty: i64) -> Option<Money> {
        self.0.checked_mul(qty).map(Money)
    }

    /// Subtract, flooring the result at zero.
    pub fn saturating_sub(self, other: Money) -> Money {
        Money((self.0 - other.0).max(0))
    }

    /// Percentage of this amount expressed in basis points (1% = 100bp),
    /// rounded half away from zero to the nearest minor unit.
    pub fn percent_bp(self, basis_points: u32) -> Money {
        let raw = self.0 as i128 * basis_points as i128;
        let rounded = if raw >= 0 {
            (raw + 5_000) / 10_000
        } else {
            (raw - 5_000) / 10_000
        };
        Money(rounded as i64)
    }

    /// Render in major units without digit grouping, e.g. `BDT 1250.50`.
    pub fn display_with(self, currency: &Currency) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        format!("{} {}{}.{:02}", currency.code(), sign, abs / 100, abs % 100)
    }
}

impl ValueObject for Money {}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Mul<i64> for Money {
    type Output = Money;

    fn mul(self, rhs: i64) -> Money {
        Money(self.0 * rhs)
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

/// ISO-4217 currency code (upper-case).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(Cow<'static, str>);

impl Currency {
    pub const BDT: Currency = Currency(Cow::Borrowed("BDT"));

    pub fn new(code: impl Into<Cow<'static, str>>) -> Self {
        let code: Cow<'static, str> = code.into();
        if code.chars().all(|c| c.is_ascii_uppercase()) {
            Self(code)
        } else {
            Self(Cow::Owned(code.to_ascii_uppercase()))
        }
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    /// Lower-case form used by payment processors.
    pub fn lowercase(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::BDT
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl ValueObject for Currency {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn percent_rounds_half_up() {
        // 10% of 12.35 = 1.235 -> 1.24
        assert_eq!(Money::from_minor(1235).percent_bp(1000), Money::from_minor(124));
        assert_eq!(Money::from_major(200).percent_bp(1500), Money::from_major(30));
    }

    #[test]
    fn display_uses_major_units() {
        assert_eq!(Money::from_minor(125050).display_with(&Currency::BDT), "BDT 1250.50");
        assert_eq!(Money::from_minor(-5).display_with(&Currency::BDT), "BDT -0.05");
    }

    #[test]
    fn currency_is_normalized_to_uppercase() {
        assert_eq!(Currency::new("usd").code(), "USD");
        assert_eq!(Currency::new("usd").lowercase(), "usd");
    }

    #[test]
    fn serializes_as_bare_integer() {
        let json = serde_json::to_string(&Money::from_minor(4999)).unwrap();
        assert_eq!(json, "4999");
    }

    proptest! {
        #[test]
        fn percent_never_exceeds_amount(amount in 0i64..10_000_000, bp in 0u32..=10_000) {
            let m = Money::from_minor(amount);
            prop_assert!(m.percent_bp(bp) <= m);
            prop_assert!(!m.percent_bp(bp).is_negative());
        }

        #[test]
        fn saturating_sub_is_never_negative(a in 0i64..1_000_000, b in 0i64..1_000_000) {
            let r = Money::from_minor(a).saturating_sub(Money::from_minor(b));
            prop_assert!(!r.is_negative());
        }
    }
}
