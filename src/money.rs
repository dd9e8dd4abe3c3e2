//! Exact decimal money arithmetic
//!
//! All balances, freeze amounts, fees, incomes and outcomes are `Money` —
//! a signed exact decimal quantized to [`SCALE`] fractional digits.
//! Binary floating point MUST NOT appear anywhere in balance math.
//!
//! Two rounding modes are used by the engine:
//! - **half-even** for the freeze reservation (a multiplication that must
//!   not systematically favor one side)
//! - **toward-zero** for deal quantities, so no outcome ever exceeds the
//!   reserved budget
//!
//! Equality, ordering and hashing are the natural decimal ones, so `Money`
//! works directly as a `BTreeMap` price key.

use once_cell::sync::Lazy;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

/// Number of fractional digits carried by every quantized amount.
/// WARNING: a constant of the wire format — never change after deployment.
pub const SCALE: u32 = 4;

/// The quantization step, `10^-SCALE`.
pub static PRECISION_EXP: Lazy<Money> = Lazy::new(|| Money(Decimal::new(1, SCALE)));

/// Rounding mode for [`Money::quantize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Banker's rounding; the default for reservation math.
    HalfEven,
    /// Truncation; for amounts that must never exceed a budget.
    TowardZero,
}

/// An exact decimal monetary value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);
    pub const ONE: Money = Money(Decimal::ONE);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// The raw decimal value.
    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Round to [`SCALE`] fractional digits with the given mode.
    pub fn quantize(self, rounding: Rounding) -> Self {
        let strategy = match rounding {
            Rounding::HalfEven => RoundingStrategy::MidpointNearestEven,
            Rounding::TowardZero => RoundingStrategy::ToZero,
        };
        Self(self.0.round_dp_with_strategy(SCALE, strategy))
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(Decimal::from(value))
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s).map(Self)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
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

impl Mul for Money {
    type Output = Money;
    fn mul(self, rhs: Money) -> Money {
        Money(self.0 * rhs.0)
    }
}

/// Multiply by a dimensionless rate (e.g. a fee rate).
impl Mul<Decimal> for Money {
    type Output = Money;
    fn mul(self, rhs: Decimal) -> Money {
        Money(self.0 * rhs)
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
        iter.fold(Money::ZERO, Add::add)
    }
}
