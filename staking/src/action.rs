//! The three staking mutations as one tagged action.

use carbonfi_gateway::EventKind;
use carbonfi_types::{PeriodId, TokenAmount};
use serde::Serialize;
use std::fmt;

/// Which mutation a transaction performs. At most one transaction per kind
/// may be outstanding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ActionKind {
    Stake,
    Withdraw,
    Claim,
}

impl ActionKind {
    /// The contract event that confirms this kind of action.
    pub fn confirming_event(&self) -> EventKind {
        match self {
            Self::Stake => EventKind::Staked,
            Self::Withdraw => EventKind::Withdrawn,
            Self::Claim => EventKind::RewardsClaimed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stake => "stake",
            Self::Withdraw => "withdraw",
            Self::Claim => "claim",
        }
    }
}

impl From<EventKind> for ActionKind {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Staked => Self::Stake,
            EventKind::Withdrawn => Self::Withdraw,
            EventKind::RewardsClaimed => Self::Claim,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutation request against one staking period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum StakeAction {
    Stake {
        period: PeriodId,
        amount: TokenAmount,
    },
    Withdraw {
        period: PeriodId,
        amount: TokenAmount,
    },
    Claim { period: PeriodId },
}

impl StakeAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Stake { .. } => ActionKind::Stake,
            Self::Withdraw { .. } => ActionKind::Withdraw,
            Self::Claim { .. } => ActionKind::Claim,
        }
    }

    pub fn period(&self) -> PeriodId {
        match *self {
            Self::Stake { period, .. } | Self::Withdraw { period, .. } | Self::Claim { period } => {
                period
            }
        }
    }

    pub fn amount(&self) -> Option<TokenAmount> {
        match *self {
            Self::Stake { amount, .. } | Self::Withdraw { amount, .. } => Some(amount),
            Self::Claim { .. } => None,
        }
    }
}
