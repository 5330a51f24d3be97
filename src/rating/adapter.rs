//! The single read/write path to live rating records
//!
//! Reads try the live store first and fall back to seed-derived records
//! when the store is unconfigured, fails, times out or is empty. Writes
//! never fall back: they need a configured store and surface its errors.
//! Nothing is remembered between calls; each one tries the live store anew.

use crate::error::{DuelError, Result};
use crate::metrics::MetricsCollector;
use crate::rating::storage::RatingStore;
use crate::types::{DuelOutcome, RaceId, RatingRecord, RatingUpdate, SwapOutcome};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Availability of the live store as seen by one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreAvailability {
    Unconfigured,
    Healthy,
    Degraded,
}

/// What happened when a read was attempted against the live store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveAttempt {
    Unconfigured,
    Failed,
    TimedOut,
    Returned { records: usize },
}

/// Why a read was served from seed data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    Unconfigured,
    Failed,
    TimedOut,
    Empty,
}

impl FallbackReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FallbackReason::Unconfigured => "unconfigured",
            FallbackReason::Failed => "error",
            FallbackReason::TimedOut => "timeout",
            FallbackReason::Empty => "empty",
        }
    }
}

/// Where a read is served from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceDecision {
    Live,
    Seed(FallbackReason),
}

/// Decide whether a list read is served from the live store or from seeds
pub fn choose_source(attempt: LiveAttempt) -> SourceDecision {
    match attempt {
        LiveAttempt::Unconfigured => SourceDecision::Seed(FallbackReason::Unconfigured),
        LiveAttempt::Failed => SourceDecision::Seed(FallbackReason::Failed),
        LiveAttempt::TimedOut => SourceDecision::Seed(FallbackReason::TimedOut),
        LiveAttempt::Returned { records: 0 } => SourceDecision::Seed(FallbackReason::Empty),
        LiveAttempt::Returned { .. } => SourceDecision::Live,
    }
}

/// Failure of a single live call
enum CallFailure {
    TimedOut(Duration),
    Error(anyhow::Error),
}

impl CallFailure {
    fn describe(&self) -> String {
        match self {
            CallFailure::TimedOut(after) => format!("timed out after {:?}", after),
            CallFailure::Error(e) => format!("{:#}", e),
        }
    }
}

/// Resilient composition of the live store and the seed source
pub struct RatingStoreAdapter {
    live: Option<Arc<dyn RatingStore>>,
    seed: Arc<dyn RatingStore>,
    timeout: Duration,
    metrics: Option<Arc<MetricsCollector>>,
}

impl RatingStoreAdapter {
    /// Create an adapter; `live = None` runs in seed-only mode
    pub fn new(
        live: Option<Arc<dyn RatingStore>>,
        seed: Arc<dyn RatingStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            live,
            seed,
            timeout,
            metrics: None,
        }
    }

    /// Attach a metrics collector
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Whether a live store is configured
    pub fn is_configured(&self) -> bool {
        self.live.is_some()
    }

    fn live(&self) -> Result<&Arc<dyn RatingStore>> {
        self.live
            .as_ref()
            .ok_or_else(|| DuelError::StoreRequired.into())
    }

    /// Run one live call under the timeout, recording its duration
    async fn call<T, F>(&self, operation: &str, future: F) -> std::result::Result<T, CallFailure>
    where
        F: Future<Output = Result<T>>,
    {
        let started = std::time::Instant::now();
        let result = match tokio::time::timeout(self.timeout, future).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(CallFailure::Error(e)),
            Err(_) => Err(CallFailure::TimedOut(self.timeout)),
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_store_operation(operation, result.is_ok(), started.elapsed());
        }
        result
    }

    /// Probe the live store with a list read
    pub async fn availability(&self) -> StoreAvailability {
        let Some(live) = &self.live else {
            return StoreAvailability::Unconfigured;
        };
        match self.call("probe", live.list_ratings()).await {
            Ok(_) => StoreAvailability::Healthy,
            Err(failure) => {
                debug!("Rating store probe failed: {}", failure.describe());
                StoreAvailability::Degraded
            }
        }
    }

    /// All rating records, from the live store or derived from seeds
    pub async fn list_ratings(&self) -> Result<Vec<RatingRecord>> {
        let (attempt, records) = match &self.live {
            None => (LiveAttempt::Unconfigured, Vec::new()),
            Some(live) => match self.call("list_ratings", live.list_ratings()).await {
                Ok(records) => (
                    LiveAttempt::Returned {
                        records: records.len(),
                    },
                    records,
                ),
                Err(failure) => {
                    warn!(
                        "[{}] Failed to load race ratings, serving seed data: {}",
                        live.name(),
                        failure.describe()
                    );
                    let attempt = match failure {
                        CallFailure::TimedOut(_) => LiveAttempt::TimedOut,
                        CallFailure::Error(_) => LiveAttempt::Failed,
                    };
                    (attempt, Vec::new())
                }
            },
        };

        match choose_source(attempt) {
            SourceDecision::Live => Ok(records),
            SourceDecision::Seed(reason) => {
                if reason == FallbackReason::Empty {
                    warn!("Rating store returned no records, serving seed data");
                } else if reason == FallbackReason::Unconfigured {
                    debug!("No rating store configured, serving seed data");
                }
                if let Some(metrics) = &self.metrics {
                    metrics.record_rating_fallback(reason.as_str());
                }
                self.seed.list_ratings().await
            }
        }
    }

    /// Exactly the records for `race_ids`; `NotFound` if any is missing.
    /// Store errors are surfaced, not replaced with seed data.
    pub async fn get_ratings_for(&self, race_ids: &[RaceId]) -> Result<Vec<RatingRecord>> {
        let live = self.live()?;

        let mut requested = race_ids.to_vec();
        requested.sort_unstable();
        requested.dedup();

        let records = self
            .call("get_ratings", live.get_ratings(&requested))
            .await
            .map_err(|failure| {
                warn!("[{}] Failed to load race ratings: {}", live.name(), failure.describe());
                DuelError::Store {
                    message: failure.describe(),
                }
            })?;

        if records.len() != requested.len() {
            let missing = requested
                .iter()
                .filter(|id| !records.iter().any(|record| record.race_id == **id))
                .copied()
                .collect();
            return Err(DuelError::NotFound {
                ids: missing,
                requested: requested.len(),
                found: records.len(),
            }
            .into());
        }

        Ok(records)
    }

    /// Insert or replace records in one write
    pub async fn upsert_ratings(&self, records: &[RatingRecord]) -> Result<()> {
        let live = self.live()?;
        self.call("upsert_ratings", live.upsert_ratings(records))
            .await
            .map_err(|failure| {
                warn!("[{}] Failed to update ratings: {}", live.name(), failure.describe());
                persistence_error(failure).into()
            })
    }

    /// Conditionally replace records in one write
    pub async fn swap_ratings(&self, updates: &[RatingUpdate]) -> Result<SwapOutcome> {
        let live = self.live()?;
        let outcome = self
            .call("swap_ratings", live.swap_ratings(updates))
            .await
            .map_err(|failure| {
                warn!("[{}] Failed to update ratings: {}", live.name(), failure.describe());
                persistence_error(failure)
            })?;

        if outcome == SwapOutcome::Conflict {
            if let Some(metrics) = &self.metrics {
                metrics.record_swap_conflict();
            }
        }
        Ok(outcome)
    }

    /// Append a duel outcome record
    pub async fn append_outcome(&self, outcome: &DuelOutcome) -> Result<()> {
        let live = self.live()?;
        self.call("append_outcome", live.append_outcome(outcome))
            .await
            .map_err(|failure| {
                DuelError::OutcomeLog {
                    message: failure.describe(),
                }
                .into()
            })
    }
}

fn persistence_error(failure: CallFailure) -> DuelError {
    match failure {
        CallFailure::Error(e) => match DuelError::find(&e) {
            Some(DuelError::Persistence { message }) => DuelError::Persistence {
                message: message.clone(),
            },
            _ => DuelError::Persistence {
                message: format!("{:#}", e),
            },
        },
        timed_out @ CallFailure::TimedOut(_) => DuelError::Persistence {
            message: timed_out.describe(),
        },
    }
}
