//! One identity's staking session.
//!
//! A [`StakingSession`] binds the registry, tracker and coordinator to one
//! [`SessionContext`]. The context never changes: when the wallet switches
//! account or network, close the session and open a new one, so nothing
//! keyed to the old identity can leak into the new one.
//!
//! With an account connected, the session subscribes to the three staking
//! events for that account. Each event triggers a period refresh followed by
//! a position refresh; only then is the `Submitted` record of the matching
//! kind marked `Confirmed`. The subscriptions live inside the listener task
//! and are dropped with it when the session closes.

use carbonfi_gateway::{ChainEvent, ChainGateway, EventKind, EventSubscription};
use carbonfi_types::{AccountAddress, ChainId, Clock, PeriodId, SystemClock, TokenAmount};
use futures_util::stream::{select_all, SelectAll};
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, Instrument};

use crate::contract::StakingContract;
use crate::tracing_spans::event_span;
use crate::{
    ActionKind, EngineConfig, EngineError, EngineMetrics, PendingTransaction, PeriodRegistry,
    PeriodSnapshot, PositionSnapshot, PositionTracker, StakeAction, StakingTotals, SubmitError,
    TransactionCoordinator,
};

/// The wallet connection a session runs on behalf of.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionContext {
    /// Connected account, if any. Without one the session is read-only and
    /// tracks no positions.
    pub account: Option<AccountAddress>,
    /// Network the wallet is connected to.
    pub chain_id: ChainId,
}

impl SessionContext {
    pub fn new(account: Option<AccountAddress>, chain_id: ChainId) -> Self {
        Self { account, chain_id }
    }
}

/// Injectable collaborators.
#[derive(Clone)]
pub struct SessionOptions {
    pub clock: Arc<dyn Clock>,
    pub metrics: Option<Arc<EngineMetrics>>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            metrics: None,
        }
    }
}

struct SessionInner {
    context: SessionContext,
    expected_chain: ChainId,
    registry: PeriodRegistry,
    tracker: PositionTracker,
    coordinator: Arc<TransactionCoordinator>,
    metrics: Option<Arc<EngineMetrics>>,
}

impl SessionInner {
    async fn refresh_positions(&self) -> Arc<PositionSnapshot> {
        // Use the periods known right now, not a refresh still in flight.
        let periods = self.registry.snapshot().ids();
        self.tracker.refresh(self.context.account, &periods).await
    }

    async fn refresh_all(&self) -> (Arc<PeriodSnapshot>, Arc<PositionSnapshot>) {
        let periods = self.registry.refresh().await;
        let positions = self
            .tracker
            .refresh(self.context.account, &periods.ids())
            .await;
        (periods, positions)
    }

    /// Refresh periods then positions, re-running either step until it is
    /// the one that publishes. A refresh superseded by another caller's may
    /// have published nothing if that caller was cancelled.
    async fn refresh_settled(&self) {
        while self.registry.try_refresh().await.is_none() {
            debug!("event refresh of periods superseded, retrying");
        }
        loop {
            let periods = self.registry.snapshot().ids();
            if self
                .tracker
                .try_refresh(self.context.account, &periods)
                .await
                .is_some()
            {
                break;
            }
            debug!("event refresh of positions superseded, retrying");
        }
    }

    async fn handle_event(&self, event: ChainEvent) {
        if let Some(m) = &self.metrics {
            m.events_received.inc();
        }
        let kind = ActionKind::from(event.kind);
        let awaiting = self.coordinator.awaiting(kind);
        debug!(amount = %event.amount, awaiting = awaiting.is_some(), "staking event received");

        self.refresh_settled().await;
        if let Some(seq) = awaiting {
            self.coordinator.confirm(kind, seq);
        }
    }
}

pub struct StakingSession {
    inner: Arc<SessionInner>,
    listener: Option<JoinHandle<()>>,
}

impl StakingSession {
    /// Open a session with the system clock and no metrics.
    pub async fn open(
        gateway: Arc<dyn ChainGateway>,
        config: &EngineConfig,
        context: SessionContext,
    ) -> Result<Self, EngineError> {
        Self::open_with(gateway, config, context, SessionOptions::default()).await
    }

    /// Open a session. Subscribes to the account's staking events but does
    /// not load any data; call [`refresh_all`](Self::refresh_all) for that.
    pub async fn open_with(
        gateway: Arc<dyn ChainGateway>,
        config: &EngineConfig,
        context: SessionContext,
        options: SessionOptions,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let contract = StakingContract::new(config.staking_contract, config.token_contract);

        let inner = Arc::new(SessionInner {
            context,
            expected_chain: config.chain_id,
            registry: PeriodRegistry::new(Arc::clone(&gateway), contract, options.metrics.clone()),
            tracker: PositionTracker::new(Arc::clone(&gateway), contract, options.metrics.clone()),
            coordinator: TransactionCoordinator::new(
                Arc::clone(&gateway),
                contract,
                options.clock,
                config.confirmation_timeout(),
                options.metrics.clone(),
            ),
            metrics: options.metrics,
        });

        let listener = match context.account {
            Some(account) => {
                let mut subscriptions = Vec::with_capacity(EventKind::ALL.len());
                for kind in EventKind::ALL {
                    let filter = contract.event_filter(kind, account);
                    subscriptions.push(gateway.subscribe(filter).await?);
                }
                Some(tokio::spawn(run_listener(
                    Arc::clone(&inner),
                    select_all(subscriptions),
                )))
            }
            None => None,
        };

        info!(
            account = ?context.account,
            chain = %context.chain_id,
            staking_contract = %config.staking_contract,
            "staking session opened"
        );
        Ok(Self { inner, listener })
    }

    pub fn context(&self) -> SessionContext {
        self.inner.context
    }

    /// Whether the wallet is on the network the contracts are deployed on.
    pub fn is_correct_network(&self) -> bool {
        self.inner.context.chain_id == self.inner.expected_chain
    }

    // ── Reads ──────────────────────────────────────────────────────────

    pub async fn refresh_periods(&self) -> Arc<PeriodSnapshot> {
        self.inner.registry.refresh().await
    }

    /// Refresh positions against the periods known at call time.
    pub async fn refresh_positions(&self) -> Arc<PositionSnapshot> {
        self.inner.refresh_positions().await
    }

    /// Refresh periods, then positions against the fresh periods.
    pub async fn refresh_all(&self) -> (Arc<PeriodSnapshot>, Arc<PositionSnapshot>) {
        self.inner.refresh_all().await
    }

    pub fn periods(&self) -> Arc<PeriodSnapshot> {
        self.inner.registry.snapshot()
    }

    pub fn positions(&self) -> Arc<PositionSnapshot> {
        self.inner.tracker.snapshot()
    }

    pub fn watch_periods(&self) -> watch::Receiver<Arc<PeriodSnapshot>> {
        self.inner.registry.watch()
    }

    pub fn watch_positions(&self) -> watch::Receiver<Arc<PositionSnapshot>> {
        self.inner.tracker.watch()
    }

    /// Aggregates over the current snapshots.
    pub fn totals(&self) -> StakingTotals {
        StakingTotals::compute(&self.periods(), &self.positions())
    }

    /// True while a refresh is in flight or a transaction awaits confirmation.
    pub fn is_busy(&self) -> bool {
        self.inner.registry.is_refreshing()
            || self.inner.tracker.is_refreshing()
            || self.inner.coordinator.has_submitted()
    }

    // ── Mutations ──────────────────────────────────────────────────────

    /// Validate and dispatch `action` for the connected account.
    pub async fn submit(&self, action: StakeAction) -> Result<PendingTransaction, SubmitError> {
        let account = self.inner.context.account.ok_or(SubmitError::NotConnected)?;
        if !self.is_correct_network() {
            return Err(SubmitError::WrongNetwork {
                connected: self.inner.context.chain_id,
                expected: self.inner.expected_chain,
            });
        }
        if self.periods().get(action.period()).is_none() {
            return Err(SubmitError::UnknownPeriod(action.period()));
        }
        let positions = self.positions();
        self.inner
            .coordinator
            .submit(account, action, &positions)
            .await
    }

    pub async fn submit_stake(
        &self,
        period: PeriodId,
        amount: TokenAmount,
    ) -> Result<PendingTransaction, SubmitError> {
        self.submit(StakeAction::Stake { period, amount }).await
    }

    pub async fn submit_withdraw(
        &self,
        period: PeriodId,
        amount: TokenAmount,
    ) -> Result<PendingTransaction, SubmitError> {
        self.submit(StakeAction::Withdraw { period, amount }).await
    }

    pub async fn submit_claim(&self, period: PeriodId) -> Result<PendingTransaction, SubmitError> {
        self.submit(StakeAction::Claim { period }).await
    }

    pub fn pending(&self) -> Vec<PendingTransaction> {
        self.inner.coordinator.pending()
    }

    pub fn transaction(&self, kind: ActionKind) -> Option<PendingTransaction> {
        self.inner.coordinator.get(kind)
    }

    /// Clear a terminal record so its kind can be submitted again.
    pub fn acknowledge(&self, kind: ActionKind) -> Option<PendingTransaction> {
        self.inner.coordinator.acknowledge(kind)
    }

    /// Stop tracking a record regardless of its state.
    pub fn abandon(&self, kind: ActionKind) -> Option<PendingTransaction> {
        self.inner.coordinator.abandon(kind)
    }

    /// Every transaction state change. A `Confirmed` update is sent only
    /// after the refresh its event triggered has published.
    pub fn updates(&self) -> broadcast::Receiver<PendingTransaction> {
        self.inner.coordinator.subscribe()
    }

    /// Stop listening for events and drop all transaction records.
    pub async fn close(mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            let _ = listener.await;
        }
        self.inner.coordinator.shutdown();
        info!(account = ?self.inner.context.account, "staking session closed");
    }
}

impl Drop for StakingSession {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        self.inner.coordinator.shutdown();
    }
}

async fn run_listener(inner: Arc<SessionInner>, mut events: SelectAll<EventSubscription>) {
    while let Some(event) = events.next().await {
        let span = event_span(event.kind, event.period);
        inner.handle_event(event).instrument(span).await;
    }
    debug!("event subscriptions closed");
}
