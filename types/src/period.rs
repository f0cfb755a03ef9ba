//! Staking period (pool) records.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{TokenAmount, TypesError};

/// Identity of a staking pool: its lock duration in seconds.
///
/// Always greater than zero; unique among the periods a contract exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct PeriodId(u64);

impl PeriodId {
    pub fn new(duration_secs: u64) -> Result<Self, TypesError> {
        if duration_secs == 0 {
            return Err(TypesError::ZeroDuration);
        }
        Ok(Self(duration_secs))
    }

    /// Convert a `uint256` duration reported by the contract.
    pub fn from_chain(raw: u128) -> Result<Self, TypesError> {
        let secs = u64::try_from(raw)
            .map_err(|_| TypesError::OutOfRange(format!("period duration {raw}")))?;
        Self::new(secs)
    }

    pub fn duration_secs(&self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for PeriodId {
    type Error = TypesError;

    fn try_from(secs: u64) -> Result<Self, Self::Error> {
        Self::new(secs)
    }
}

impl From<PeriodId> for u64 {
    fn from(id: PeriodId) -> Self {
        id.0
    }
}

impl fmt::Display for PeriodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Annual percentage rate in whole percent (12.5 means 12.50%).
///
/// The contract reports APR as an integer scaled by 100; [`Apr::from_scaled`]
/// is the only place that scale is removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Apr(f64);

impl Apr {
    pub const ZERO: Self = Self(0.0);

    /// Build from the contract's scaled-by-100 representation (1250 = 12.50%).
    pub fn from_scaled(scaled: u128) -> Self {
        Self(scaled as f64 / 100.0)
    }

    pub fn percent(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Apr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}%", self.0)
    }
}

/// One configured staking pool as last read from the contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StakingPeriod {
    /// Pool identity (lock duration).
    pub duration: PeriodId,
    /// Protocol-defined reward scaling factor, opaque to the engine.
    pub reward_rate: u128,
    /// Aggregate stake across all participants.
    pub total_staked: TokenAmount,
    pub is_active: bool,
    pub apr: Apr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_duration_is_rejected() {
        assert_eq!(PeriodId::new(0), Err(TypesError::ZeroDuration));
        assert!(PeriodId::from_chain(0).is_err());
    }

    #[test]
    fn chain_duration_must_fit_u64() {
        assert!(PeriodId::from_chain(u128::from(u64::MAX) + 1).is_err());
        assert_eq!(
            PeriodId::from_chain(2_592_000).unwrap().duration_secs(),
            2_592_000
        );
    }

    #[test]
    fn deserializing_zero_duration_fails() {
        assert!(serde_json::from_str::<PeriodId>("0").is_err());
        assert_eq!(
            serde_json::from_str::<PeriodId>("86400").unwrap(),
            PeriodId::new(86_400).unwrap()
        );
    }

    #[test]
    fn apr_divides_scale_once() {
        assert_eq!(Apr::from_scaled(1250).percent(), 12.5);
        assert_eq!(Apr::from_scaled(1875).to_string(), "18.75%");
        assert_eq!(Apr::from_scaled(0), Apr::ZERO);
    }
}
