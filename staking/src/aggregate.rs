//! Read-only rollups over the current period and position snapshots.

use carbonfi_types::{PeriodId, StakingPeriod, TokenAmount, UserPosition};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::{PeriodSnapshot, PositionSnapshot};

/// Σ `total_staked` over every pool.
pub fn total_value_locked(periods: &[StakingPeriod]) -> TokenAmount {
    periods.iter().map(|p| p.total_staked).sum()
}

/// Σ `amount` over every tracked position.
pub fn user_total_staked(positions: &BTreeMap<PeriodId, UserPosition>) -> TokenAmount {
    positions.values().map(|p| p.amount).sum()
}

/// Σ `pending_reward` over every tracked position.
pub fn user_total_pending_reward(positions: &BTreeMap<PeriodId, UserPosition>) -> TokenAmount {
    positions.values().map(|p| p.pending_reward).sum()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StakingTotals {
    pub total_value_locked: TokenAmount,
    pub user_total_staked: TokenAmount,
    pub user_total_pending_reward: TokenAmount,
}

impl StakingTotals {
    pub fn compute(periods: &PeriodSnapshot, positions: &PositionSnapshot) -> Self {
        Self {
            total_value_locked: total_value_locked(&periods.periods),
            user_total_staked: user_total_staked(&positions.positions),
            user_total_pending_reward: user_total_pending_reward(&positions.positions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carbonfi_types::{Apr, Timestamp};

    fn pool(secs: u64, total: u128) -> StakingPeriod {
        StakingPeriod {
            duration: PeriodId::new(secs).unwrap(),
            reward_rate: 1,
            total_staked: TokenAmount::new(total),
            is_active: true,
            apr: Apr::from_scaled(1000),
        }
    }

    fn position(amount: u128, pending: u128) -> UserPosition {
        UserPosition {
            amount: TokenAmount::new(amount),
            start_time: Timestamp::new(0),
            accumulated_reward: TokenAmount::new(99),
            pending_reward: TokenAmount::new(pending),
        }
    }

    #[test]
    fn sums_over_snapshots() {
        let periods = PeriodSnapshot {
            periods: vec![pool(60, 1_000), pool(120, 2_500)],
            error: None,
        };
        let mut map = BTreeMap::new();
        map.insert(PeriodId::new(60).unwrap(), position(100, 4));
        map.insert(PeriodId::new(120).unwrap(), position(400, 6));
        let positions = PositionSnapshot {
            positions: map,
            ..PositionSnapshot::default()
        };

        let totals = StakingTotals::compute(&periods, &positions);
        assert_eq!(totals.total_value_locked, TokenAmount::new(3_500));
        assert_eq!(totals.user_total_staked, TokenAmount::new(500));
        assert_eq!(totals.user_total_pending_reward, TokenAmount::new(10));
    }

    #[test]
    fn empty_snapshots_sum_to_zero() {
        let totals =
            StakingTotals::compute(&PeriodSnapshot::default(), &PositionSnapshot::default());
        assert_eq!(totals, StakingTotals::default());
    }

    #[test]
    fn totals_saturate() {
        let periods = [pool(60, u128::MAX), pool(120, 1)];
        assert_eq!(total_value_locked(&periods), TokenAmount::new(u128::MAX));
    }
}
