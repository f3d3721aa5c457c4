use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use thiserror::Error;

use crate::MinorUnits;

/// The platform fee that applies when neither an organization override nor a platform setting exists.
pub const DEFAULT_PLATFORM_FEE: FeePercent = FeePercent(30);

const MAX_TENTHS: i64 = 1000;

//--------------------------------------     FeePercent       ---------------------------------------------------------
/// A fee percentage with exactly one decimal of precision, in the range `[0.0, 100.0]`.
///
/// Internally the value is stored as tenths of a percent, so `2.5%` is `25`. This keeps fee arithmetic exact.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[sqlx(transparent)]
pub struct FeePercent(i64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeePercentError {
    #[error("Fee percentage is not a number: {0}")]
    NotANumber(String),
    #[error("Fee percentage must be between 0.0 and 100.0, got {0}")]
    OutOfRange(String),
    #[error("Fee percentage supports at most one decimal place, got {0}")]
    TooPrecise(String),
}

impl FeePercent {
    pub fn from_tenths(tenths: i64) -> Result<Self, FeePercentError> {
        if (0..=MAX_TENTHS).contains(&tenths) {
            Ok(Self(tenths))
        } else {
            Err(FeePercentError::OutOfRange(format!("{}.{}", tenths / 10, (tenths % 10).abs())))
        }
    }

    pub fn tenths(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Calculates `round(amount * percent / 100)`, rounding halves away from zero.
    ///
    /// For non-negative amounts the result is always in `[0, amount]`.
    pub fn fee_for(&self, amount: MinorUnits) -> MinorUnits {
        let magnitude = i128::from(amount.value()).abs();
        let fee = (magnitude * i128::from(self.0) + i128::from(MAX_TENTHS / 2)) / i128::from(MAX_TENTHS);
        // fee <= magnitude <= i64::MAX because tenths <= 1000
        let fee = i64::try_from(fee).unwrap_or(i64::MAX);
        if amount.is_negative() {
            MinorUnits::from(-fee)
        } else {
            MinorUnits::from(fee)
        }
    }
}

impl Display for FeePercent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

impl FromStr for FeePercent {
    type Err = FeePercentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_end_matches('%').trim();
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(FeePercentError::NotANumber(s.to_string()));
        }
        let frac_digit = match frac.len() {
            0 => 0,
            1 => i64::from(frac.as_bytes()[0] - b'0'),
            _ if frac[1..].chars().all(|c| c == '0') => i64::from(frac.as_bytes()[0] - b'0'),
            _ => return Err(FeePercentError::TooPrecise(s.to_string())),
        };
        let whole = whole.parse::<i64>().map_err(|_| FeePercentError::OutOfRange(s.to_string()))?;
        let tenths = whole.checked_mul(10).and_then(|w| w.checked_add(frac_digit));
        match tenths {
            Some(t) if t <= MAX_TENTHS => Ok(Self(t)),
            _ => Err(FeePercentError::OutOfRange(s.to_string())),
        }
    }
}

impl Serialize for FeePercent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FeePercent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(f64),
        }
        let value = match Repr::deserialize(deserializer)? {
            Repr::Text(s) => s,
            Repr::Number(n) => format!("{n}"),
        };
        value.parse().map_err(serde::de::Error::custom)
    }
}
