//! A user's stake within one staking period.

use serde::{Deserialize, Serialize};

use crate::{PeriodId, Timestamp, TokenAmount};

/// One identity's position in one pool.
///
/// A zero `amount` means "no position"; trackers never store such rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPosition {
    pub amount: TokenAmount,
    pub start_time: Timestamp,
    pub accumulated_reward: TokenAmount,
    /// Non-decreasing between claims.
    pub pending_reward: TokenAmount,
}

impl UserPosition {
    /// Whether this row represents an actual stake.
    pub fn is_active(&self) -> bool {
        !self.amount.is_zero()
    }

    /// When the lock on this position ends.
    pub fn unlocks_at(&self, period: PeriodId) -> Timestamp {
        self.start_time.plus_secs(period.duration_secs())
    }

    pub fn is_unlocked(&self, period: PeriodId, now: Timestamp) -> bool {
        now >= self.unlocks_at(period)
    }
}
