//! Prometheus metrics for the staking engine.
//!
//! [`EngineMetrics`] owns a dedicated [`Registry`] so several sessions (or
//! tests) can run in one process without clashing on the default registry.
//! [`EngineMetrics::encode_text`] renders the Prometheus text exposition.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

pub struct EngineMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Period refreshes that published a snapshot.
    pub period_refreshes: IntCounter,
    /// Period refreshes that failed discovery and kept stale periods.
    pub discovery_failures: IntCounter,
    /// Pools dropped because one of their parameter reads failed.
    pub periods_dropped: IntCounter,
    /// Position refreshes that published a snapshot.
    pub position_refreshes: IntCounter,
    /// Position refreshes that reported a query error.
    pub position_query_failures: IntCounter,
    /// Refresh results discarded because a newer refresh had started.
    pub refreshes_superseded: IntCounter,
    pub transactions_submitted: IntCounter,
    pub transactions_confirmed: IntCounter,
    /// Dispatch failures and confirmation timeouts.
    pub transactions_failed: IntCounter,
    /// Confirming events received on the identity's subscriptions.
    pub events_received: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub tracked_periods: IntGauge,
    pub tracked_positions: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time from dispatch to confirmation, in milliseconds.
    pub confirmation_latency_ms: Histogram,
}

impl EngineMetrics {
    /// Create a fresh set of metrics, all registered under a new [`Registry`].
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let period_refreshes = register_int_counter_with_registry!(
            Opts::new(
                "carbonfi_period_refreshes_total",
                "Period refreshes that published a snapshot"
            ),
            registry
        )?;

        let discovery_failures = register_int_counter_with_registry!(
            Opts::new(
                "carbonfi_discovery_failures_total",
                "Period refreshes that failed to discover pools"
            ),
            registry
        )?;

        let periods_dropped = register_int_counter_with_registry!(
            Opts::new(
                "carbonfi_periods_dropped_total",
                "Pools dropped because a parameter read failed"
            ),
            registry
        )?;

        let position_refreshes = register_int_counter_with_registry!(
            Opts::new(
                "carbonfi_position_refreshes_total",
                "Position refreshes that published a snapshot"
            ),
            registry
        )?;

        let position_query_failures = register_int_counter_with_registry!(
            Opts::new(
                "carbonfi_position_query_failures_total",
                "Position refreshes with failed reads"
            ),
            registry
        )?;

        let refreshes_superseded = register_int_counter_with_registry!(
            Opts::new(
                "carbonfi_refreshes_superseded_total",
                "Refresh results discarded in favour of a newer refresh"
            ),
            registry
        )?;

        let transactions_submitted = register_int_counter_with_registry!(
            Opts::new(
                "carbonfi_transactions_submitted_total",
                "Transactions dispatched to the gateway"
            ),
            registry
        )?;

        let transactions_confirmed = register_int_counter_with_registry!(
            Opts::new(
                "carbonfi_transactions_confirmed_total",
                "Transactions confirmed by an on-chain event"
            ),
            registry
        )?;

        let transactions_failed = register_int_counter_with_registry!(
            Opts::new(
                "carbonfi_transactions_failed_total",
                "Transactions that failed to dispatch or timed out"
            ),
            registry
        )?;

        let events_received = register_int_counter_with_registry!(
            Opts::new(
                "carbonfi_events_received_total",
                "Staking events received for the connected account"
            ),
            registry
        )?;

        let tracked_periods = register_int_gauge_with_registry!(
            Opts::new("carbonfi_tracked_periods", "Pools in the current snapshot"),
            registry
        )?;

        let tracked_positions = register_int_gauge_with_registry!(
            Opts::new(
                "carbonfi_tracked_positions",
                "Non-zero positions in the current snapshot"
            ),
            registry
        )?;

        // Exponential buckets covering 50 ms → ~14 min.
        let confirmation_latency_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "carbonfi_confirmation_latency_ms",
                "Time from dispatch to confirmation in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(50.0, 2.0, 15)?),
            registry
        )?;

        Ok(Self {
            registry,
            period_refreshes,
            discovery_failures,
            periods_dropped,
            position_refreshes,
            position_query_failures,
            refreshes_superseded,
            transactions_submitted,
            transactions_confirmed,
            transactions_failed,
            events_received,
            tracked_periods,
            tracked_positions,
            confirmation_latency_ms,
        })
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn independent_registries_do_not_clash() {
        let a = EngineMetrics::new().unwrap();
        let b = EngineMetrics::new().unwrap();
        a.transactions_submitted.inc();
        assert_eq!(a.transactions_submitted.get(), 1);
        assert_eq!(b.transactions_submitted.get(), 0);
    }

    #[test]
    fn text_exposition_names_metrics() {
        let metrics = EngineMetrics::new().unwrap();
        metrics.tracked_periods.set(3);
        metrics.confirmation_latency_ms.observe(120.0);
        let text = metrics.encode_text().unwrap();
        assert!(text.contains("carbonfi_tracked_periods 3"));
        assert!(text.contains("carbonfi_confirmation_latency_ms_count 1"));
    }
}
