//! Staking period discovery.
//!
//! A refresh lists the pool identifiers, then reads every pool's parameters
//! and APR in one batched round-trip. Results are paired positionally: the
//! batch carries `[info(p0), apr(p0), info(p1), apr(p1), ...]`. A pool whose
//! info or APR read fails is dropped; the rest still publish. If the
//! identifier list itself cannot be read, the previous periods stay in place
//! next to a [`DiscoveryError`].

use carbonfi_gateway::{ChainGateway, ReadCall, ReadResult};
use carbonfi_types::{PeriodId, StakingPeriod};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

use crate::contract::{decode_apr, decode_period_ids, decode_period_info, StakingContract};
use crate::snapshot::SnapshotCell;
use crate::tracing_spans::refresh_span;
use crate::{DiscoveryError, EngineMetrics};

/// The registry's published state: last good periods plus the latest error.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PeriodSnapshot {
    /// Pools in contract order, each with both reads successful.
    pub periods: Vec<StakingPeriod>,
    /// Set when the most recent refresh failed; `periods` is then stale.
    pub error: Option<DiscoveryError>,
}

impl PeriodSnapshot {
    pub fn ids(&self) -> Vec<PeriodId> {
        self.periods.iter().map(|p| p.duration).collect()
    }

    pub fn get(&self, id: PeriodId) -> Option<&StakingPeriod> {
        self.periods.iter().find(|p| p.duration == id)
    }

    pub fn is_stale(&self) -> bool {
        self.error.is_some()
    }
}

pub struct PeriodRegistry {
    gateway: Arc<dyn ChainGateway>,
    contract: StakingContract,
    cell: SnapshotCell<PeriodSnapshot>,
    metrics: Option<Arc<EngineMetrics>>,
}

impl PeriodRegistry {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        contract: StakingContract,
        metrics: Option<Arc<EngineMetrics>>,
    ) -> Self {
        Self {
            gateway,
            contract,
            cell: SnapshotCell::new(PeriodSnapshot::default()),
            metrics,
        }
    }

    /// Re-discover every pool and publish the result.
    ///
    /// Returns the snapshot current when the refresh finishes. If a newer
    /// refresh started meanwhile, this one's result is discarded and the
    /// current snapshot is returned instead.
    pub async fn refresh(&self) -> Arc<PeriodSnapshot> {
        match self.try_refresh().await {
            Some(snapshot) => snapshot,
            None => self.cell.current(),
        }
    }

    /// Like [`refresh`](Self::refresh), but returns `None` when a newer
    /// refresh superseded this one and its result was discarded.
    pub async fn try_refresh(&self) -> Option<Arc<PeriodSnapshot>> {
        let ticket = self.cell.begin();
        let span = refresh_span("periods", ticket.generation());
        async move {
            let outcome = self.discover().await;
            let published = ticket.publish(|previous| match outcome {
                Ok(periods) => PeriodSnapshot {
                    periods,
                    error: None,
                },
                Err(error) => PeriodSnapshot {
                    periods: previous.periods.clone(),
                    error: Some(error),
                },
            });
            match &published {
                Some(snapshot) => self.record(snapshot),
                None => {
                    debug!("period refresh superseded");
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

    pub fn snapshot(&self) -> Arc<PeriodSnapshot> {
        self.cell.current()
    }

    pub fn watch(&self) -> watch::Receiver<Arc<PeriodSnapshot>> {
        self.cell.watch()
    }

    pub fn is_refreshing(&self) -> bool {
        self.cell.is_refreshing()
    }

    async fn discover(&self) -> Result<Vec<StakingPeriod>, DiscoveryError> {
        let listed = self
            .gateway
            .read(self.contract.available_periods())
            .await
            .map_err(DiscoveryError::ListPeriods)?;
        let mut ids = decode_period_ids(&listed).map_err(DiscoveryError::Decode)?;

        let mut seen = HashSet::new();
        ids.retain(|id| seen.insert(*id));
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let calls: Vec<ReadCall> = ids
            .iter()
            .flat_map(|id| [self.contract.period_info(*id), self.contract.apr(*id)])
            .collect();
        let results = self
            .gateway
            .read_batch(calls)
            .await
            .map_err(DiscoveryError::Parameters)?;

        let periods = pair_period_reads(&ids, results)?;
        let dropped = ids.len() - periods.len();
        if dropped > 0 {
            if let Some(m) = &self.metrics {
                m.periods_dropped.inc_by(dropped as u64);
            }
        }
        Ok(periods)
    }

    fn record(&self, snapshot: &PeriodSnapshot) {
        match &snapshot.error {
            None => info!(count = snapshot.periods.len(), "staking periods refreshed"),
            Some(e) => warn!(
                error = %e,
                retained = snapshot.periods.len(),
                "period discovery failed, keeping previous periods"
            ),
        }
        if let Some(m) = &self.metrics {
            m.period_refreshes.inc();
            if snapshot.error.is_some() {
                m.discovery_failures.inc();
            }
            m.tracked_periods.set(snapshot.periods.len() as i64);
        }
    }
}

/// Pair batched parameter reads with their identifiers.
///
/// `results[2i]` is the info read and `results[2i + 1]` the APR read for
/// `ids[i]`. A pool is kept only if both reads succeeded and decoded.
pub fn pair_period_reads(
    ids: &[PeriodId],
    results: Vec<ReadResult>,
) -> Result<Vec<StakingPeriod>, DiscoveryError> {
    if results.len() != ids.len() * 2 {
        return Err(DiscoveryError::Decode(format!(
            "expected {} parameter results for {} periods, got {}",
            ids.len() * 2,
            ids.len(),
            results.len()
        )));
    }

    let mut periods = Vec::with_capacity(ids.len());
    let mut results = results.into_iter();
    for &duration in ids {
        let (Some(info), Some(apr)) = (results.next(), results.next()) else {
            break;
        };
        let decoded = info
            .map_err(|e| e.to_string())
            .and_then(|v| decode_period_info(&v))
            .and_then(|params| {
                apr.map_err(|e| e.to_string())
                    .and_then(|v| decode_apr(&v))
                    .map(|apr| (params, apr))
            });
        match decoded {
            Ok((params, apr)) => periods.push(StakingPeriod {
                duration,
                reward_rate: params.reward_rate,
                total_staked: params.total_staked,
                is_active: params.is_active,
                apr,
            }),
            Err(reason) => warn!(period = %duration, %reason, "dropping staking period"),
        }
    }
    Ok(periods)
}
