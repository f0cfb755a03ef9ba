//! Token amount type and 18-decimal unit conversion.
//!
//! Amounts are represented as fixed-point integers (u128) in base units to
//! avoid floating-point errors. One whole token is `10^18` base units.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use crate::TypesError;

/// Number of decimals of the staking token.
pub const TOKEN_DECIMALS: u32 = 18;

const ONE_TOKEN: u128 = 10u128.pow(TOKEN_DECIMALS);

/// An amount of the staking token, in base units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenAmount(#[serde(with = "decimal_string")] u128);

impl TokenAmount {
    pub const ZERO: Self = Self(0);

    pub fn new(raw: u128) -> Self {
        Self(raw)
    }

    /// An amount of whole tokens.
    pub fn from_tokens(tokens: u128) -> Self {
        Self(tokens.saturating_mul(ONE_TOKEN))
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl Add for TokenAmount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }
}

/// Sums saturate at `u128::MAX` instead of panicking.
impl Sum for TokenAmount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::saturating_add)
    }
}

impl<'a> Sum<&'a TokenAmount> for TokenAmount {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} CAFI", format_units(*self))
    }
}

/// Parse a decimal token string (`"1.5"`) into base units.
///
/// At most [`TOKEN_DECIMALS`] fractional digits are accepted; anything finer
/// than one base unit is rejected rather than rounded.
pub fn parse_units(input: &str) -> Result<TokenAmount, TypesError> {
    let invalid = |reason: &str| TypesError::InvalidAmount {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty input"));
    }

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("no digits"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid("expected an unsigned decimal number"));
    }
    if fraction.len() > TOKEN_DECIMALS as usize {
        return Err(invalid("more than 18 decimal places"));
    }

    let whole_units = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u128>()
            .map_err(|_| invalid("amount too large"))?
    };
    let padded = format!("{fraction:0<width$}", width = TOKEN_DECIMALS as usize);
    let fraction_units = padded.parse::<u128>().map_err(|_| invalid("bad fraction"))?;

    whole_units
        .checked_mul(ONE_TOKEN)
        .and_then(|w| w.checked_add(fraction_units))
        .map(TokenAmount)
        .ok_or_else(|| invalid("amount too large"))
}

/// Render base units as a decimal token string, trimming trailing zeros.
pub fn format_units(amount: TokenAmount) -> String {
    let whole = amount.0 / ONE_TOKEN;
    let fraction = amount.0 % ONE_TOKEN;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{fraction:0>width$}", width = TOKEN_DECIMALS as usize);
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

/// Serde adapter that carries a `u128` as a decimal string.
///
/// JSON numbers lose precision past 2^53, which base-unit balances routinely
/// exceed.
pub mod decimal_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<u128>().map_err(de::Error::custom)
    }
}
