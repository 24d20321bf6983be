//! Token amounts.
//!
//! Amounts are fixed-point integers (u128) in the chain's smallest unit, paired
//! with a denomination, e.g. `100urmo`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::AirdropError;

/// A quantity of a single denomination.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u128,
}

impl Coin {
    pub fn new(amount: u128, denom: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    /// A zero amount of the given denomination (used for zero-fee transactions).
    pub fn zero(denom: impl Into<String>) -> Self {
        Self::new(0, denom)
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for Coin {
    type Err = AirdropError;

    /// Parse the `<amount><denom>` form, e.g. `"100urmo"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| AirdropError::InvalidAmount(format!("missing denomination in '{s}'")))?;
        let (digits, denom) = s.split_at(split);
        if digits.is_empty() {
            return Err(AirdropError::InvalidAmount(format!("missing amount in '{s}'")));
        }
        let valid_denom = denom.len() >= 2
            && denom.starts_with(|c: char| c.is_ascii_alphabetic())
            && denom
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-'));
        if !valid_denom {
            return Err(AirdropError::InvalidAmount(format!("invalid denomination '{denom}'")));
        }
        let amount = digits
            .parse::<u128>()
            .map_err(|e| AirdropError::InvalidAmount(format!("{digits}: {e}")))?;
        Ok(Self::new(amount, denom))
    }
}
