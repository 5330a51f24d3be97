//! Rating storage interface and implementations
//!
//! This module defines the interface for persisting and retrieving race
//! ratings, plus an in-memory store used by tests and local runs.

use crate::error::{DuelError, Result};
use crate::types::{DuelOutcome, RaceId, RatingRecord, RatingUpdate, SwapOutcome};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Trait for rating storage operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RatingStore: Send + Sync {
    /// Short name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Get every stored rating record
    async fn list_ratings(&self) -> Result<Vec<RatingRecord>>;

    /// Get the records for the given races; missing ids are simply absent
    async fn get_ratings(&self, race_ids: &[RaceId]) -> Result<Vec<RatingRecord>>;

    /// Insert or replace records keyed by race id, all or nothing
    async fn upsert_ratings(&self, records: &[RatingRecord]) -> Result<()>;

    /// Apply every update only if each stored record still matches its
    /// `previous` state; otherwise change nothing
    async fn swap_ratings(&self, updates: &[RatingUpdate]) -> Result<SwapOutcome>;

    /// Append a duel outcome to the log
    async fn append_outcome(&self, outcome: &DuelOutcome) -> Result<()>;
}

/// Failure switches for exercising degraded paths
#[derive(Debug, Default, Clone, Copy)]
pub struct FailureMode {
    pub fail_reads: bool,
    pub fail_writes: bool,
    pub fail_outcomes: bool,
}

/// In-memory rating storage implementation
#[derive(Debug, Default)]
pub struct InMemoryRatingStore {
    ratings: RwLock<HashMap<RaceId, RatingRecord>>,
    outcomes: RwLock<Vec<DuelOutcome>>,
    write_calls: RwLock<usize>,
    failures: RwLock<FailureMode>,
}

impl InMemoryRatingStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store preloaded with records
    pub fn with_records(records: Vec<RatingRecord>) -> Self {
        let store = Self::new();
        if let Ok(mut ratings) = store.ratings.write() {
            for record in records {
                ratings.insert(record.race_id, record);
            }
        }
        store
    }

    /// Switch simulated failures on or off
    pub fn set_failure_mode(&self, mode: FailureMode) {
        if let Ok(mut failures) = self.failures.write() {
            *failures = mode;
        }
    }

    /// Number of rating write calls that reached the store
    pub fn write_calls(&self) -> usize {
        self.write_calls.read().map(|calls| *calls).unwrap_or_default()
    }

    /// Outcomes appended so far
    pub fn outcomes(&self) -> Vec<DuelOutcome> {
        self.outcomes
            .read()
            .map(|outcomes| outcomes.clone())
            .unwrap_or_default()
    }

    /// Current record for a race, if stored
    pub fn record(&self, race_id: RaceId) -> Option<RatingRecord> {
        self.ratings
            .read()
            .ok()
            .and_then(|ratings| ratings.get(&race_id).cloned())
    }

    fn failure_mode(&self) -> FailureMode {
        self.failures.read().map(|mode| *mode).unwrap_or_default()
    }

    fn count_write(&self) {
        if let Ok(mut calls) = self.write_calls.write() {
            *calls += 1;
        }
    }
}

fn lock_error(kind: &str) -> DuelError {
    DuelError::Store {
        message: format!("Failed to acquire ratings {} lock", kind),
    }
}

#[async_trait]
impl RatingStore for InMemoryRatingStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list_ratings(&self) -> Result<Vec<RatingRecord>> {
        if self.failure_mode().fail_reads {
            return Err(DuelError::Store {
                message: "simulated read failure".to_string(),
            }
            .into());
        }

        let ratings = self.ratings.read().map_err(|_| lock_error("read"))?;
        let mut records: Vec<RatingRecord> = ratings.values().cloned().collect();
        records.sort_by_key(|record| record.race_id);
        Ok(records)
    }

    async fn get_ratings(&self, race_ids: &[RaceId]) -> Result<Vec<RatingRecord>> {
        if self.failure_mode().fail_reads {
            return Err(DuelError::Store {
                message: "simulated read failure".to_string(),
            }
            .into());
        }

        let ratings = self.ratings.read().map_err(|_| lock_error("read"))?;
        Ok(race_ids
            .iter()
            .filter_map(|race_id| ratings.get(race_id).cloned())
            .collect())
    }

    async fn upsert_ratings(&self, records: &[RatingRecord]) -> Result<()> {
        self.count_write();
        if self.failure_mode().fail_writes {
            return Err(DuelError::Persistence {
                message: "simulated write failure".to_string(),
            }
            .into());
        }

        let mut ratings = self.ratings.write().map_err(|_| lock_error("write"))?;
        for record in records {
            ratings.insert(record.race_id, record.clone());
        }
        Ok(())
    }

    async fn swap_ratings(&self, updates: &[RatingUpdate]) -> Result<SwapOutcome> {
        self.count_write();
        if self.failure_mode().fail_writes {
            return Err(DuelError::Persistence {
                message: "simulated write failure".to_string(),
            }
            .into());
        }

        // Check and apply under one write lock so the swap is atomic
        let mut ratings = self.ratings.write().map_err(|_| lock_error("write"))?;
        let all_match = updates.iter().all(|update| {
            ratings
                .get(&update.previous.race_id)
                .is_some_and(|stored| stored.same_state(&update.previous))
        });
        if !all_match {
            return Ok(SwapOutcome::Conflict);
        }

        for update in updates {
            ratings.insert(update.next.race_id, update.next.clone());
        }
        Ok(SwapOutcome::Applied)
    }

    async fn append_outcome(&self, outcome: &DuelOutcome) -> Result<()> {
        if self.failure_mode().fail_outcomes {
            return Err(DuelError::OutcomeLog {
                message: "simulated outcome failure".to_string(),
            }
            .into());
        }

        let mut outcomes = self.outcomes.write().map_err(|_| lock_error("write"))?;
        outcomes.push(outcome.clone());
        Ok(())
    }
}
