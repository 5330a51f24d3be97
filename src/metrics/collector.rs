//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the race-duel service using
//! Prometheus metrics.

use anyhow::Result;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use std::time::Duration;

/// Main metrics collector for the duel service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Duel and vote metrics
    duel_metrics: DuelMetrics,

    /// Rating store metrics
    store_metrics: StoreMetrics,
}

/// Duel and vote metrics
#[derive(Clone)]
pub struct DuelMetrics {
    /// Total duels served
    pub duels_served_total: IntCounter,

    /// Votes by result (recorded, invalid, not_found, conflict, failed, store_required)
    pub votes_total: IntCounterVec,

    /// Number of races in the last loaded dataset
    pub races_loaded: IntGauge,
}

/// Rating store metrics
#[derive(Clone)]
pub struct StoreMetrics {
    /// Reads served from seed data, by reason
    pub rating_fallbacks_total: IntCounterVec,

    /// Outcome log appends that failed
    pub outcome_log_failures_total: IntCounter,

    /// Conditional writes that lost a race
    pub swap_conflicts_total: IntCounter,

    /// Store operation durations
    pub operation_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let duel_metrics = DuelMetrics::new(&registry)?;
        let store_metrics = StoreMetrics::new(&registry)?;

        Ok(Self {
            registry,
            duel_metrics,
            store_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn duel(&self) -> &DuelMetrics {
        &self.duel_metrics
    }

    pub fn store(&self) -> &StoreMetrics {
        &self.store_metrics
    }

    /// Record a duel being served
    pub fn record_duel_served(&self, races_available: usize) {
        self.duel_metrics.duels_served_total.inc();
        self.duel_metrics.races_loaded.set(races_available as i64);
    }

    /// Record a vote result
    pub fn record_vote(&self, result: &str) {
        self.duel_metrics.votes_total.with_label_values(&[result]).inc();
    }

    /// Record a read served from seed data
    pub fn record_rating_fallback(&self, reason: &str) {
        self.store_metrics
            .rating_fallbacks_total
            .with_label_values(&[reason])
            .inc();
    }

    pub fn record_outcome_log_failure(&self) {
        self.store_metrics.outcome_log_failures_total.inc();
    }

    pub fn record_swap_conflict(&self) {
        self.store_metrics.swap_conflicts_total.inc();
    }

    /// Record a store operation
    pub fn record_store_operation(&self, operation: &str, success: bool, duration: Duration) {
        let status = if success { "success" } else { "error" };
        self.store_metrics
            .operation_duration
            .with_label_values(&[operation, status])
            .observe(duration.as_secs_f64());
    }
}

impl DuelMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let duels_served_total =
            IntCounter::new("race_duel_duels_served_total", "Total duels served")?;
        registry.register(Box::new(duels_served_total.clone()))?;

        let votes_total = IntCounterVec::new(
            Opts::new("race_duel_votes_total", "Total votes by result"),
            &["result"],
        )?;
        registry.register(Box::new(votes_total.clone()))?;

        let races_loaded = IntGauge::new(
            "race_duel_races_loaded",
            "Number of races available for duels",
        )?;
        registry.register(Box::new(races_loaded.clone()))?;

        Ok(Self {
            duels_served_total,
            votes_total,
            races_loaded,
        })
    }
}

impl StoreMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let rating_fallbacks_total = IntCounterVec::new(
            Opts::new(
                "race_duel_rating_fallbacks_total",
                "Rating reads served from seed data",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(rating_fallbacks_total.clone()))?;

        let outcome_log_failures_total = IntCounter::new(
            "race_duel_outcome_log_failures_total",
            "Duel outcomes that could not be appended",
        )?;
        registry.register(Box::new(outcome_log_failures_total.clone()))?;

        let swap_conflicts_total = IntCounter::new(
            "race_duel_swap_conflicts_total",
            "Conditional rating writes rejected by a concurrent update",
        )?;
        registry.register(Box::new(swap_conflicts_total.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "race_duel_store_operation_duration_seconds",
                "Rating store operation durations",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["operation", "status"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            rating_fallbacks_total,
            outcome_log_failures_total,
            swap_conflicts_total,
            operation_duration,
        })
    }
}
