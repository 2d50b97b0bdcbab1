use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// Number of fractional digits carried by an [`Amount`]
pub const DECIMALS: usize = 8;

/// Base units per whole coin
pub const UNITS_PER_COIN: i64 = 100_000_000;

/// Errors that can occur while parsing an amount
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("Empty amount")]
    Empty,

    #[error("Invalid digit in amount: {0}")]
    InvalidDigit(String),

    #[error("Too many fractional digits (max 8): {0}")]
    TooPrecise(String),

    #[error("Amount out of range: {0}")]
    Overflow(String),
}

/// Fixed-precision decimal value
///
/// Stored as a signed count of base units so that the textual form is
/// identical on every platform. Balances may go negative, transaction values
/// may not (see [`Transaction::new`](super::Transaction::new)).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Creates an amount from raw base units
    pub const fn from_units(units: i64) -> Self {
        Amount(units)
    }

    /// Creates an amount from a whole number of coins
    pub const fn from_coins(coins: i64) -> Self {
        Amount(coins * UNITS_PER_COIN)
    }

    /// Raw base units
    pub const fn units(&self) -> i64 {
        self.0
    }

    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per_coin = UNITS_PER_COIN as u64;
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            abs / per_coin,
            abs % per_coin,
            width = DECIMALS
        )
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (whole, fraction) = match body.split_once('.') {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (body, None),
        };

        if whole.is_empty() && fraction.map_or(true, str::is_empty) {
            return Err(AmountError::Empty);
        }

        let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !is_digits(whole) || fraction.map_or(false, |f| f.is_empty() || !is_digits(f)) {
            return Err(AmountError::InvalidDigit(s.to_string()));
        }

        let fraction = fraction.unwrap_or("");
        if fraction.len() > DECIMALS {
            return Err(AmountError::TooPrecise(s.to_string()));
        }

        let overflow = || AmountError::Overflow(s.to_string());

        let whole_units = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<i64>()
                .map_err(|_| overflow())?
                .checked_mul(UNITS_PER_COIN)
                .ok_or_else(overflow)?
        };

        let fraction_units = if fraction.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", fraction, width = DECIMALS);
            padded.parse::<i64>().map_err(|_| overflow())?
        };

        let units = whole_units
            .checked_add(fraction_units)
            .ok_or_else(overflow)?;

        Ok(Amount(if negative { -units } else { units }))
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        *self = *self + rhs;
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Amount) {
        *self = *self - rhs;
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount(self.0.saturating_neg())
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal amount as a string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        v.checked_mul(UNITS_PER_COIN)
            .map(Amount)
            .ok_or_else(|| E::custom(AmountError::Overflow(v.to_string())))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        i64::try_from(v)
            .map_err(|_| E::custom(AmountError::Overflow(v.to_string())))
            .and_then(|v| self.visit_i64(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
        // Shortest round-trip rendering, then the exact decimal parser
        format!("{}", v).parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let amount: Amount = "1.5".parse().unwrap();
        assert_eq!(amount.units(), 150_000_000);
        assert_eq!(amount.to_string(), "1.50000000");

        let amount: Amount = "-0.00000001".parse().unwrap();
        assert_eq!(amount.units(), -1);
        assert_eq!(amount.to_string(), "-0.00000001");

        assert_eq!("42".parse::<Amount>().unwrap(), Amount::from_coins(42));
        assert_eq!(".25".parse::<Amount>().unwrap().units(), 25_000_000);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!("".parse::<Amount>(), Err(AmountError::Empty));
        assert!(matches!(
            "1.000000001".parse::<Amount>(),
            Err(AmountError::TooPrecise(_))
        ));
        assert!(matches!("1.".parse::<Amount>(), Err(AmountError::InvalidDigit(_))));
        assert!(matches!("1e5".parse::<Amount>(), Err(AmountError::InvalidDigit(_))));
        assert!(matches!(
            "99999999999999999999".parse::<Amount>(),
            Err(AmountError::Overflow(_))
        ));
    }

    #[test]
    fn test_arithmetic() {
        let mut total = Amount::ZERO;
        total += Amount::from_coins(3);
        total -= "0.5".parse().unwrap();
        assert_eq!(total.to_string(), "2.50000000");
        assert_eq!((-total).to_string(), "-2.50000000");
        assert_eq!(Amount::from_units(i64::MAX) + Amount::from_units(1), Amount::from_units(i64::MAX));
    }

    #[test]
    fn test_serde() {
        let amount: Amount = "12.34".parse().unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"12.34000000\"");

        let parsed: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, amount);

        let from_number: Amount = serde_json::from_str("12.34").unwrap();
        assert_eq!(from_number, amount);

        let from_integer: Amount = serde_json::from_str("7").unwrap();
        assert_eq!(from_integer, Amount::from_coins(7));
    }
}
