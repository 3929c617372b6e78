use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const CURRENCY_CODE: &str = "INR";

//--------------------------------------       Money         ---------------------------------------------------------
/// An amount of money in integer minor units (paise). All balances, fees and prizes in the system are expressed in
/// this type. There is deliberately no floating-point constructor.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in minor currency units: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {} is too large to convert to Money", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.abs() < 100 {
            write!(f, "{}p", self.0)
        } else {
            let rupees = self.0 as f64 / 100.0;
            write!(f, "₹{rupees:0.2}")
        }
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_rupees(rupees: i64) -> Self {
        Self(rupees * 100)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic() {
        let a = Money::from(250);
        let b = Money::from(100);
        assert_eq!(a + b, Money::from(350));
        assert_eq!(a - b, Money::from(150));
        assert_eq!(-b, Money::from(-100));
        assert_eq!(b * 3, Money::from(300));
        let total: Money = [a, b, b].into_iter().sum();
        assert_eq!(total, Money::from(450));
    }

    #[test]
    fn display() {
        assert_eq!(Money::from(50).to_string(), "50p");
        assert_eq!(Money::from_rupees(35).to_string(), "₹35.00");
        assert_eq!(Money::from(12_345).to_string(), "₹123.45");
    }
}
