//! Confirmed staking events delivered by the gateway.

use carbonfi_types::{AccountAddress, PeriodId, TokenAmount};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TxHandle;

/// The three staking contract events the engine listens for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    Staked,
    Withdrawn,
    RewardsClaimed,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [Self::Staked, Self::Withdrawn, Self::RewardsClaimed];

    /// Event name as declared in the contract ABI.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Staked => "Staked",
            Self::Withdrawn => "Withdrawn",
            Self::RewardsClaimed => "RewardsClaimed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

/// One confirmed event occurrence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    pub contract: AccountAddress,
    pub kind: EventKind,
    pub account: AccountAddress,
    pub period: PeriodId,
    pub amount: TokenAmount,
    #[serde(default)]
    pub tx: Option<TxHandle>,
    #[serde(default)]
    pub block_number: Option<u64>,
}

/// Subscription filter: one event kind on one contract, optionally scoped to an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    pub contract: AccountAddress,
    pub kind: EventKind,
    pub account: Option<AccountAddress>,
}

impl EventFilter {
    pub fn new(contract: AccountAddress, kind: EventKind, account: Option<AccountAddress>) -> Self {
        Self {
            contract,
            kind,
            account,
        }
    }

    pub fn matches(&self, event: &ChainEvent) -> bool {
        event.contract == self.contract
            && event.kind == self.kind
            && self.account.map_or(true, |a| a == event.account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> AccountAddress {
        AccountAddress::new([byte; 20])
    }

    fn event(kind: EventKind, account: AccountAddress) -> ChainEvent {
        ChainEvent {
            contract: addr(1),
            kind,
            account,
            period: PeriodId::new(86_400).unwrap(),
            amount: TokenAmount::new(10),
            tx: None,
            block_number: None,
        }
    }

    #[test]
    fn filter_scopes_by_kind_and_account() {
        let filter = EventFilter::new(addr(1), EventKind::Staked, Some(addr(9)));
        assert!(filter.matches(&event(EventKind::Staked, addr(9))));
        assert!(!filter.matches(&event(EventKind::Staked, addr(8))));
        assert!(!filter.matches(&event(EventKind::Withdrawn, addr(9))));
    }

    #[test]
    fn unscoped_filter_accepts_any_account() {
        let filter = EventFilter::new(addr(1), EventKind::RewardsClaimed, None);
        assert!(filter.matches(&event(EventKind::RewardsClaimed, addr(3))));
    }
}
