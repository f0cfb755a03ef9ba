//! Transaction submission and confirmation tracking.
//!
//! Each action kind has at most one tracked record. A record is reserved
//! (state `Submitted`) before the write is dispatched, so a confirming event
//! that races the dispatch still finds it, and a double submission is
//! rejected without reaching the gateway. Records leave `Submitted` when a
//! confirming event arrives, when dispatch fails, or when the confirmation
//! timer fires; terminal records stay until the caller acknowledges them.

use carbonfi_gateway::{ChainGateway, TxHandle};
use carbonfi_types::{AccountAddress, Clock, PeriodId, Timestamp, TokenAmount};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};

use crate::contract::StakingContract;
use crate::positions::PositionSnapshot;
use crate::tracing_spans::submit_span;
use crate::{
    ActionKind, ConcurrentSubmissionError, ConfirmationTimeoutError, EngineMetrics,
    InvalidAmountError, StakeAction, SubmitError, TxFailure,
};

const UPDATE_BUFFER: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxState {
    Submitted,
    Confirmed,
    Failed(TxFailure),
}

impl TxState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Submitted)
    }
}

/// The local record of one submitted mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingTransaction {
    pub kind: ActionKind,
    pub target_period: PeriodId,
    pub amount: Option<TokenAmount>,
    pub submitted_at: Timestamp,
    /// Set once the gateway accepted the write.
    pub tx: Option<TxHandle>,
    pub state: TxState,
}

struct Record {
    seq: u64,
    tx: PendingTransaction,
    dispatched: Instant,
    timer: Option<JoinHandle<()>>,
}

impl Record {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

pub struct TransactionCoordinator {
    gateway: Arc<dyn ChainGateway>,
    contract: StakingContract,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    records: Mutex<HashMap<ActionKind, Record>>,
    next_seq: AtomicU64,
    updates: broadcast::Sender<PendingTransaction>,
    metrics: Option<Arc<EngineMetrics>>,
    this: Weak<Self>,
}

impl TransactionCoordinator {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        contract: StakingContract,
        clock: Arc<dyn Clock>,
        timeout: Duration,
        metrics: Option<Arc<EngineMetrics>>,
    ) -> Arc<Self> {
        let (updates, _) = broadcast::channel(UPDATE_BUFFER);
        Arc::new_cyclic(|this| Self {
            gateway,
            contract,
            clock,
            timeout,
            records: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            updates,
            metrics,
            this: this.clone(),
        })
    }

    /// Validate `action`, reserve its kind and dispatch the write for `account`.
    ///
    /// Returns as soon as the gateway accepts the write; confirmation arrives
    /// later through [`subscribe`](Self::subscribe). `positions` supplies the
    /// balance and staked amounts used for validation.
    pub async fn submit(
        &self,
        account: AccountAddress,
        action: StakeAction,
        positions: &PositionSnapshot,
    ) -> Result<PendingTransaction, SubmitError> {
        let kind = action.kind();
        async move {
            validate(&action, positions)?;
            let seq = self.reserve(&action)?;

            let call = self.contract.action_call(&action, account);
            match self.gateway.write(call).await {
                Ok(handle) => {
                    info!(tx = %handle, "transaction dispatched");
                    if let Some(m) = &self.metrics {
                        m.transactions_submitted.inc();
                    }
                    Ok(self
                        .attach(kind, seq, handle.clone())
                        .unwrap_or_else(|| self.detached(&action, handle)))
                }
                Err(e) => {
                    warn!(error = %e, "transaction dispatch failed");
                    self.fail(kind, seq, TxFailure::Dispatch(e.clone()));
                    Err(SubmitError::Dispatch(e))
                }
            }
        }
        .instrument(submit_span(kind, action.period()))
        .await
    }

    /// Sequence number of the `Submitted` record of `kind`, if any.
    ///
    /// Capture this when an event arrives and pass it to
    /// [`confirm`](Self::confirm) once the refresh the event triggered is
    /// done, so a record submitted in between is not confirmed by it.
    pub fn awaiting(&self, kind: ActionKind) -> Option<u64> {
        self.lock()
            .get(&kind)
            .filter(|r| r.tx.state == TxState::Submitted)
            .map(|r| r.seq)
    }

    /// Mark the record `seq` of `kind` as `Confirmed`.
    pub fn confirm(&self, kind: ActionKind, seq: u64) -> Option<PendingTransaction> {
        let confirmed = {
            let mut records = self.lock();
            let record = records
                .get_mut(&kind)
                .filter(|r| r.seq == seq && r.tx.state == TxState::Submitted)?;
            record.cancel_timer();
            record.tx.state = TxState::Confirmed;
            if let Some(m) = &self.metrics {
                m.transactions_confirmed.inc();
                m.confirmation_latency_ms
                    .observe(record.dispatched.elapsed().as_secs_f64() * 1_000.0);
            }
            record.tx.clone()
        };
        info!(%kind, period = %confirmed.target_period, "transaction confirmed");
        self.publish(&confirmed);
        Some(confirmed)
    }

    /// Timer callback: fail record `seq` if it is still unconfirmed.
    fn expire(&self, kind: ActionKind, seq: u64) {
        let failure = {
            let records = self.lock();
            match records.get(&kind) {
                Some(r) if r.seq == seq && r.tx.state == TxState::Submitted => {
                    ConfirmationTimeoutError {
                        kind,
                        period: r.tx.target_period,
                        waited_secs: self.timeout.as_secs(),
                    }
                }
                _ => return,
            }
        };
        warn!(error = %failure, "confirmation timed out");
        self.fail(kind, seq, failure.into());
    }

    /// Remove a terminal record of `kind` so the kind can be submitted again.
    /// A record still `Submitted` is left in place and `None` is returned.
    pub fn acknowledge(&self, kind: ActionKind) -> Option<PendingTransaction> {
        let mut records = self.lock();
        if !records.get(&kind)?.tx.state.is_terminal() {
            return None;
        }
        records.remove(&kind).map(|r| r.tx)
    }

    /// Stop tracking the record of `kind`, whatever its state. The on-chain
    /// effect of an already dispatched write is not affected.
    pub fn abandon(&self, kind: ActionKind) -> Option<PendingTransaction> {
        let mut record = self.lock().remove(&kind)?;
        record.cancel_timer();
        debug!(%kind, "transaction record abandoned");
        Some(record.tx)
    }

    pub fn get(&self, kind: ActionKind) -> Option<PendingTransaction> {
        self.lock().get(&kind).map(|r| r.tx.clone())
    }

    /// Every tracked record, ordered by kind.
    pub fn pending(&self) -> Vec<PendingTransaction> {
        let mut all: Vec<_> = self.lock().values().map(|r| r.tx.clone()).collect();
        all.sort_by_key(|tx| tx.kind);
        all
    }

    pub fn has_submitted(&self) -> bool {
        self.lock()
            .values()
            .any(|r| r.tx.state == TxState::Submitted)
    }

    /// Receive every state change of every record.
    pub fn subscribe(&self) -> broadcast::Receiver<PendingTransaction> {
        self.updates.subscribe()
    }

    /// Drop all records and stop their timers.
    pub fn shutdown(&self) {
        let mut records = self.lock();
        for record in records.values_mut() {
            record.cancel_timer();
        }
        records.clear();
    }

    // ── Internals ──────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, HashMap<ActionKind, Record>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn reserve(&self, action: &StakeAction) -> Result<u64, SubmitError> {
        let kind = action.kind();
        let (seq, tx) = {
            let mut records = self.lock();
            if let Some(existing) = records.get(&kind) {
                match &existing.tx.state {
                    TxState::Submitted => {
                        return Err(ConcurrentSubmissionError {
                            kind,
                            submitted_at: existing.tx.submitted_at,
                        }
                        .into())
                    }
                    TxState::Failed(failure) => {
                        return Err(SubmitError::Unacknowledged {
                            kind,
                            failure: failure.clone(),
                        })
                    }
                    TxState::Confirmed => {}
                }
            }

            let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
            let tx = PendingTransaction {
                kind,
                target_period: action.period(),
                amount: action.amount(),
                submitted_at: self.clock.now(),
                tx: None,
                state: TxState::Submitted,
            };
            records.insert(
                kind,
                Record {
                    seq,
                    tx: tx.clone(),
                    dispatched: Instant::now(),
                    timer: Some(self.arm_timer(kind, seq)),
                },
            );
            (seq, tx)
        };
        self.publish(&tx);
        Ok(seq)
    }

    fn arm_timer(&self, kind: ActionKind, seq: u64) -> JoinHandle<()> {
        let this = self.this.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(coordinator) = this.upgrade() {
                coordinator.expire(kind, seq);
            }
        })
    }

    fn fail(&self, kind: ActionKind, seq: u64, failure: TxFailure) {
        let failed = {
            let mut records = self.lock();
            let Some(record) = records
                .get_mut(&kind)
                .filter(|r| r.seq == seq && r.tx.state == TxState::Submitted)
            else {
                return;
            };
            record.cancel_timer();
            record.tx.state = TxState::Failed(failure);
            record.tx.clone()
        };
        if let Some(m) = &self.metrics {
            m.transactions_failed.inc();
        }
        self.publish(&failed);
    }

    /// Store the transaction handle on record `seq`, whatever its state.
    fn attach(&self, kind: ActionKind, seq: u64, handle: TxHandle) -> Option<PendingTransaction> {
        let mut records = self.lock();
        let record = records.get_mut(&kind).filter(|r| r.seq == seq)?;
        record.tx.tx = Some(handle);
        Some(record.tx.clone())
    }

    /// Record returned for a write whose local record was abandoned or
    /// acknowledged before the gateway answered.
    fn detached(&self, action: &StakeAction, handle: TxHandle) -> PendingTransaction {
        PendingTransaction {
            kind: action.kind(),
            target_period: action.period(),
            amount: action.amount(),
            submitted_at: self.clock.now(),
            tx: Some(handle),
            state: TxState::Submitted,
        }
    }

    fn publish(&self, tx: &PendingTransaction) {
        // No receivers is fine.
        let _ = self.updates.send(tx.clone());
    }
}

impl Drop for TransactionCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Client-side checks run before anything is dispatched.
pub fn validate(
    action: &StakeAction,
    positions: &PositionSnapshot,
) -> Result<(), InvalidAmountError> {
    match *action {
        StakeAction::Stake { amount, .. } => {
            if amount.is_zero() {
                return Err(InvalidAmountError::Zero);
            }
            let available = positions.balance.ok_or(InvalidAmountError::BalanceUnknown)?;
            if amount > available {
                return Err(InvalidAmountError::ExceedsBalance {
                    requested: amount,
                    available,
                });
            }
        }
        StakeAction::Withdraw { period, amount } => {
            if amount.is_zero() {
                return Err(InvalidAmountError::Zero);
            }
            let staked = positions
                .get(period)
                .map(|p| p.amount)
                .unwrap_or(TokenAmount::ZERO);
            if amount > staked {
                return Err(InvalidAmountError::ExceedsPosition {
                    period,
                    requested: amount,
                    staked,
                });
            }
        }
        StakeAction::Claim { .. } => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use carbonfi_gateway::GatewayError;
    use carbonfi_nullables::{NullClock, NullGateway};
    use carbonfi_types::UserPosition;
    use std::collections::BTreeMap;

    const TIMEOUT: Duration = Duration::from_secs(30);

    fn period() -> PeriodId {
        PeriodId::new(2_592_000).unwrap()
    }

    fn account() -> AccountAddress {
        AccountAddress::new([5; 20])
    }

    fn positions(balance: u128, staked: u128) -> PositionSnapshot {
        let mut map = BTreeMap::new();
        if staked > 0 {
            map.insert(
                period(),
                UserPosition {
                    amount: TokenAmount::new(staked),
                    start_time: Timestamp::new(1),
                    accumulated_reward: TokenAmount::ZERO,
                    pending_reward: TokenAmount::ZERO,
                },
            );
        }
        PositionSnapshot {
            account: Some(account()),
            positions: map,
            balance: Some(TokenAmount::new(balance)),
            error: None,
        }
    }

    fn stake(amount: u128) -> StakeAction {
        StakeAction::Stake {
            period: period(),
            amount: TokenAmount::new(amount),
        }
    }

    fn coordinator(gateway: Arc<NullGateway>) -> Arc<TransactionCoordinator> {
        TransactionCoordinator::new(
            gateway,
            StakingContract::new(AccountAddress::new([1; 20]), AccountAddress::new([2; 20])),
            Arc::new(NullClock::new(1_000)),
            TIMEOUT,
            None,
        )
    }

    #[test]
    fn validation_rules() {
        let snapshot = positions(100, 40);
        assert_eq!(validate(&stake(0), &snapshot), Err(InvalidAmountError::Zero));
        assert!(validate(&stake(100), &snapshot).is_ok());
        assert!(matches!(
            validate(&stake(101), &snapshot),
            Err(InvalidAmountError::ExceedsBalance { .. })
        ));

        let withdraw = |amount| StakeAction::Withdraw {
            period: period(),
            amount: TokenAmount::new(amount),
        };
        assert!(validate(&withdraw(40), &snapshot).is_ok());
        assert!(matches!(
            validate(&withdraw(41), &snapshot),
            Err(InvalidAmountError::ExceedsPosition { .. })
        ));
        assert!(validate(&StakeAction::Claim { period: period() }, &snapshot).is_ok());

        let unknown = PositionSnapshot {
            balance: None,
            ..snapshot
        };
        assert_eq!(
            validate(&stake(1), &unknown),
            Err(InvalidAmountError::BalanceUnknown)
        );
    }

    #[tokio::test]
    async fn invalid_amount_never_reaches_gateway() {
        let gateway = Arc::new(NullGateway::new());
        let coordinator = coordinator(Arc::clone(&gateway));
        let err = coordinator
            .submit(account(), stake(500), &positions(100, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::InvalidAmount(_)));
        assert!(gateway.writes().is_empty());
        assert!(coordinator.pending().is_empty());
    }

    #[tokio::test]
    async fn dispatch_failure_blocks_until_acknowledged() {
        let gateway = Arc::new(NullGateway::new());
        let coordinator = coordinator(Arc::clone(&gateway));
        gateway.fail_next_write(GatewayError::Rejected("user denied".into()));

        let err = coordinator
            .submit(account(), stake(10), &positions(100, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Dispatch(GatewayError::Rejected(_))));
        let record = coordinator.get(ActionKind::Stake).unwrap();
        assert!(matches!(record.state, TxState::Failed(TxFailure::Dispatch(_))));

        let blocked = coordinator
            .submit(account(), stake(10), &positions(100, 0))
            .await
            .unwrap_err();
        assert!(matches!(blocked, SubmitError::Unacknowledged { .. }));

        assert!(coordinator.acknowledge(ActionKind::Stake).is_some());
        let tx = coordinator
            .submit(account(), stake(10), &positions(100, 0))
            .await
            .unwrap();
        assert_eq!(tx.state, TxState::Submitted);
        assert_eq!(tx.submitted_at, Timestamp::new(1_000));
        assert!(tx.tx.is_some());
    }

    #[tokio::test]
    async fn confirm_requires_the_captured_sequence() {
        let gateway = Arc::new(NullGateway::new());
        let coordinator = coordinator(gateway);
        coordinator
            .submit(account(), stake(10), &positions(100, 0))
            .await
            .unwrap();

        let seq = coordinator.awaiting(ActionKind::Stake).unwrap();
        assert_eq!(coordinator.confirm(ActionKind::Stake, seq + 1), None);
        assert_eq!(coordinator.awaiting(ActionKind::Withdraw), None);

        let confirmed = coordinator.confirm(ActionKind::Stake, seq).unwrap();
        assert_eq!(confirmed.state, TxState::Confirmed);
        assert!(!coordinator.has_submitted());
        assert_eq!(coordinator.confirm(ActionKind::Stake, seq), None);
    }

    #[tokio::test]
    async fn acknowledge_leaves_submitted_records_alone() {
        let gateway = Arc::new(NullGateway::new());
        let coordinator = coordinator(gateway);
        coordinator
            .submit(account(), stake(10), &positions(100, 0))
            .await
            .unwrap();
        assert_eq!(coordinator.acknowledge(ActionKind::Stake), None);
        assert!(coordinator.has_submitted());

        let abandoned = coordinator.abandon(ActionKind::Stake).unwrap();
        assert_eq!(abandoned.state, TxState::Submitted);
        assert!(coordinator.pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unconfirmed_record_times_out() {
        let gateway = Arc::new(NullGateway::new());
        let coordinator = coordinator(gateway);
        let mut updates = coordinator.subscribe();
        coordinator
            .submit(account(), stake(10), &positions(100, 0))
            .await
            .unwrap();
        assert_eq!(updates.recv().await.unwrap().state, TxState::Submitted);

        tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;
        let failed = updates.recv().await.unwrap();
        assert_eq!(
            failed.state,
            TxState::Failed(TxFailure::Timeout(ConfirmationTimeoutError {
                kind: ActionKind::Stake,
                period: period(),
                waited_secs: 30,
            }))
        );
        assert!(!coordinator.has_submitted());
    }
}
