//! Per-period positions of the connected identity.
//!
//! Every refresh is a full re-fetch: one `getUserStakeInfo` read per known
//! period plus the identity's token balance, all in one batch. Positions
//! with a zero amount are pruned. A failed per-period read leaves that
//! period out of the map (unknown, not zero) and is listed in the snapshot's
//! [`QueryError`].

use carbonfi_gateway::{ChainGateway, GatewayError, ReadCall, ReadResult};
use carbonfi_types::{AccountAddress, PeriodId, TokenAmount, UserPosition};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

use crate::contract::{decode_balance, decode_stake_info, StakingContract};
use crate::snapshot::SnapshotCell;
use crate::tracing_spans::refresh_span;
use crate::{EngineMetrics, QueryError};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PositionSnapshot {
    /// Identity the positions belong to; `None` when nobody is connected.
    pub account: Option<AccountAddress>,
    /// Non-zero positions keyed by period.
    pub positions: BTreeMap<PeriodId, UserPosition>,
    /// Spendable token balance, if it was read successfully.
    pub balance: Option<TokenAmount>,
    pub error: Option<QueryError>,
}

impl PositionSnapshot {
    fn empty(account: Option<AccountAddress>) -> Self {
        Self {
            account,
            ..Self::default()
        }
    }

    pub fn get(&self, period: PeriodId) -> Option<&UserPosition> {
        self.positions.get(&period)
    }

    /// Staked amount in `period`, or `None` if that period's read failed.
    pub fn staked_in(&self, period: PeriodId) -> Option<TokenAmount> {
        match self.positions.get(&period) {
            Some(p) => Some(p.amount),
            None if self.error.as_ref().is_some_and(|e| e.covers(period)) => None,
            None => Some(TokenAmount::ZERO),
        }
    }
}

pub struct PositionTracker {
    gateway: Arc<dyn ChainGateway>,
    contract: StakingContract,
    cell: SnapshotCell<PositionSnapshot>,
    metrics: Option<Arc<EngineMetrics>>,
}

impl PositionTracker {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        contract: StakingContract,
        metrics: Option<Arc<EngineMetrics>>,
    ) -> Self {
        Self {
            gateway,
            contract,
            cell: SnapshotCell::new(PositionSnapshot::default()),
            metrics,
        }
    }

    /// Re-read `account`'s position in each of `periods` and publish the result.
    ///
    /// With no account or no periods this publishes an empty snapshot without
    /// touching the gateway. Superseded refreshes are discarded like in
    /// [`PeriodRegistry::refresh`](crate::PeriodRegistry::refresh).
    pub async fn refresh(
        &self,
        account: Option<AccountAddress>,
        periods: &[PeriodId],
    ) -> Arc<PositionSnapshot> {
        match self.try_refresh(account, periods).await {
            Some(snapshot) => snapshot,
            None => self.cell.current(),
        }
    }

    /// Like [`refresh`](Self::refresh), but returns `None` when a newer
    /// refresh superseded this one and its result was discarded.
    pub async fn try_refresh(
        &self,
        account: Option<AccountAddress>,
        periods: &[PeriodId],
    ) -> Option<Arc<PositionSnapshot>> {
        let ticket = self.cell.begin();
        let span = refresh_span("positions", ticket.generation());
        async move {
            let published = match account {
                Some(account) if !periods.is_empty() => {
                    let outcome = self.query(account, periods).await;
                    ticket.publish(|previous| match outcome {
                        Ok(snapshot) => snapshot,
                        Err(e) if previous.account == Some(account) => PositionSnapshot {
                            error: Some(QueryError::Batch(e)),
                            ..previous.clone()
                        },
                        Err(e) => PositionSnapshot {
                            error: Some(QueryError::Batch(e)),
                            ..PositionSnapshot::empty(Some(account))
                        },
                    })
                }
                _ => ticket.publish(|_| PositionSnapshot::empty(account)),
            };
            match &published {
                Some(snapshot) => self.record(snapshot),
                None => {
                    debug!("position refresh superseded");
                    if let Some(m) = &self.metrics {
                        m.refreshes_superseded.inc();
                    }
                }
            }
            published
        }
        .instrument(span)
        .await
    }

    pub fn snapshot(&self) -> Arc<PositionSnapshot> {
        self.cell.current()
    }

    pub fn watch(&self) -> watch::Receiver<Arc<PositionSnapshot>> {
        self.cell.watch()
    }

    pub fn is_refreshing(&self) -> bool {
        self.cell.is_refreshing()
    }

    async fn query(
        &self,
        account: AccountAddress,
        periods: &[PeriodId],
    ) -> Result<PositionSnapshot, GatewayError> {
        let mut calls: Vec<ReadCall> = periods
            .iter()
            .map(|p| self.contract.user_stake_info(account, *p))
            .collect();
        calls.push(self.contract.balance_of(account));

        let results = self.gateway.read_batch(calls).await?;
        if results.len() != periods.len() + 1 {
            return Err(GatewayError::Decode(format!(
                "expected {} position results, got {}",
                periods.len() + 1,
                results.len()
            )));
        }
        Ok(collect_positions(account, periods, results))
    }

    fn record(&self, snapshot: &PositionSnapshot) {
        match &snapshot.error {
            None => info!(count = snapshot.positions.len(), "positions refreshed"),
            Some(e) => warn!(
                error = %e,
                count = snapshot.positions.len(),
                "positions refreshed with errors"
            ),
        }
        if let Some(m) = &self.metrics {
            m.position_refreshes.inc();
            if snapshot.error.is_some() {
                m.position_query_failures.inc();
            }
            m.tracked_positions.set(snapshot.positions.len() as i64);
        }
    }
}

/// Build a snapshot from `results`: one stake-info read per period, then the
/// balance read.
fn collect_positions(
    account: AccountAddress,
    periods: &[PeriodId],
    results: Vec<ReadResult>,
) -> PositionSnapshot {
    let mut positions = BTreeMap::new();
    let mut failed = Vec::new();
    let mut results = results.into_iter();

    for (&period, result) in periods.iter().zip(results.by_ref()) {
        match result
            .map_err(|e| e.to_string())
            .and_then(|v| decode_stake_info(&v))
        {
            Ok(position) if position.is_active() => {
                positions.insert(period, position);
            }
            Ok(_) => {}
            Err(reason) => {
                warn!(period = %period, %reason, "position read failed");
                failed.push(period);
            }
        }
    }

    let balance = match results.next() {
        Some(Ok(value)) => decode_balance(&value).ok(),
        _ => None,
    };
    if balance.is_none() {
        warn!(%account, "token balance read failed");
    }

    let error = if failed.is_empty() && balance.is_some() {
        None
    } else {
        Some(QueryError::Partial {
            periods: failed,
            balance: balance.is_none(),
        })
    };

    PositionSnapshot {
        account: Some(account),
        positions,
        balance,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carbonfi_gateway::AbiValue;

    fn period(secs: u64) -> PeriodId {
        PeriodId::new(secs).unwrap()
    }

    fn stake(amount: u128, pending: u128) -> ReadResult {
        Ok(AbiValue::List(vec![
            AbiValue::Uint(amount),
            AbiValue::Uint(1_700_000_000),
            AbiValue::Uint(0),
            AbiValue::Uint(pending),
        ]))
    }

    fn account() -> AccountAddress {
        AccountAddress::new([5; 20])
    }

    #[test]
    fn zero_amounts_are_pruned() {
        let periods = [period(60), period(120)];
        let snapshot = collect_positions(
            account(),
            &periods,
            vec![stake(0, 0), stake(500, 3), Ok(AbiValue::Uint(1_000))],
        );
        assert_eq!(snapshot.positions.len(), 1);
        assert_eq!(snapshot.positions[&period(120)].amount, TokenAmount::new(500));
        assert_eq!(snapshot.balance, Some(TokenAmount::new(1_000)));
        assert_eq!(snapshot.error, None);
        assert_eq!(snapshot.staked_in(period(60)), Some(TokenAmount::ZERO));
    }

    #[test]
    fn failed_reads_are_unknown_not_zero() {
        let periods = [period(60), period(120)];
        let failure = Err(GatewayError::Call {
            function: "getUserStakeInfo".into(),
            reason: "reverted".into(),
        });
        let snapshot = collect_positions(
            account(),
            &periods,
            vec![failure, stake(7, 0), Ok(AbiValue::Uint(1))],
        );
        assert_eq!(snapshot.positions.len(), 1);
        assert_eq!(snapshot.staked_in(period(60)), None);
        assert_eq!(
            snapshot.error,
            Some(QueryError::Partial {
                periods: vec![period(60)],
                balance: false,
            })
        );
    }

    #[test]
    fn failed_balance_is_reported() {
        let failure = Err(GatewayError::Transport("timeout".into()));
        let snapshot = collect_positions(account(), &[period(60)], vec![stake(1, 0), failure]);
        assert_eq!(snapshot.balance, None);
        assert!(matches!(
            snapshot.error,
            Some(QueryError::Partial { balance: true, .. })
        ));
    }
}
