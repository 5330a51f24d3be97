//! Vote processing
//!
//! A vote reads both rating records, computes the simultaneous Elo update
//! from the pre-update values and writes both records together. With
//! conditional writes enabled the write only lands if neither record changed
//! since it was read; a conflict re-reads and retries a bounded number of
//! times. The duel outcome is appended afterwards on a best-effort basis.

use crate::config::AppConfig;
use crate::error::{DuelError, Result};
use crate::metrics::MetricsCollector;
use crate::rating::{duel_ratings, expected_score, RatingStoreAdapter, DEFAULT_K_FACTOR};
use crate::types::{DuelOutcome, RaceId, RatingRecord, RatingUpdate, SwapOutcome};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Vote processing settings
#[derive(Debug, Clone)]
pub struct VoteSettings {
    pub k_factor: f64,
    /// Use compare-and-swap writes instead of plain upserts
    pub conditional_writes: bool,
    pub max_swap_attempts: u32,
}

impl Default for VoteSettings {
    fn default() -> Self {
        Self {
            k_factor: DEFAULT_K_FACTOR,
            conditional_writes: true,
            max_swap_attempts: 3,
        }
    }
}

impl From<&AppConfig> for VoteSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            k_factor: config.rating.k_factor,
            conditional_writes: config.store.conditional_writes,
            max_swap_attempts: config.store.max_swap_attempts,
        }
    }
}

/// What an accepted vote changed
#[derive(Debug, Clone)]
pub struct VoteReceipt {
    pub winner: RatingRecord,
    pub loser: RatingRecord,
    pub winner_expected: f64,
    /// Write attempts used, 1 unless a conflict forced a retry
    pub attempts: u32,
}

/// Check that both ids are present, positive and distinct
pub fn validate_vote(winner: Option<RaceId>, loser: Option<RaceId>) -> Result<(RaceId, RaceId)> {
    let (Some(winner), Some(loser)) = (winner, loser) else {
        return Err(invalid("winnerRaceId and loserRaceId are required"));
    };
    if winner <= 0 || loser <= 0 {
        return Err(invalid("race ids must be positive integers"));
    }
    if winner == loser {
        return Err(invalid("a race cannot win against itself"));
    }
    Ok((winner, loser))
}

fn invalid(reason: &str) -> anyhow::Error {
    DuelError::InvalidVote {
        reason: reason.to_string(),
    }
    .into()
}

/// Next state of both records after `winner` beats `loser`, plus the
/// winner's pre-update expected score. Ratings are rounded here because
/// this is the value that gets persisted.
pub fn apply_vote(
    winner: &RatingRecord,
    loser: &RatingRecord,
    k_factor: f64,
    now: DateTime<Utc>,
) -> (RatingRecord, RatingRecord, f64) {
    let winner_expected = expected_score(winner.elo, loser.elo);
    let (winner_elo, loser_elo) = duel_ratings(winner.elo, loser.elo, k_factor);

    let next_winner = RatingRecord {
        wins: winner.wins + 1,
        elo: winner_elo.round(),
        updated_at: now,
        ..winner.clone()
    };
    let next_loser = RatingRecord {
        losses: loser.losses + 1,
        elo: loser_elo.round(),
        updated_at: now,
        ..loser.clone()
    };
    (next_winner, next_loser, winner_expected)
}

/// Metric label for a vote result
fn vote_result_label(result: &Result<VoteReceipt>) -> &'static str {
    let Err(err) = result else {
        return "recorded";
    };
    match DuelError::find(err) {
        Some(DuelError::InvalidVote { .. }) => "invalid",
        Some(DuelError::NotFound { .. }) => "not_found",
        Some(DuelError::StoreRequired) => "store_required",
        Some(DuelError::Conflict { .. }) => "conflict",
        _ => "failed",
    }
}

/// Applies votes through the rating store adapter
pub struct VoteProcessor {
    ratings: Arc<RatingStoreAdapter>,
    settings: VoteSettings,
    metrics: Option<Arc<MetricsCollector>>,
}

impl VoteProcessor {
    pub fn new(ratings: Arc<RatingStoreAdapter>, settings: VoteSettings) -> Self {
        Self {
            ratings,
            settings,
            metrics: None,
        }
    }

    /// Attach a metrics collector
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn settings(&self) -> &VoteSettings {
        &self.settings
    }

    /// Record that `winner` beat `loser`
    pub async fn record_vote(
        &self,
        winner: Option<RaceId>,
        loser: Option<RaceId>,
    ) -> Result<VoteReceipt> {
        let result = self.process(winner, loser).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_vote(vote_result_label(&result));
        }
        result
    }

    async fn process(&self, winner: Option<RaceId>, loser: Option<RaceId>) -> Result<VoteReceipt> {
        let (winner_id, loser_id) = validate_vote(winner, loser)?;
        if !self.ratings.is_configured() {
            return Err(DuelError::StoreRequired.into());
        }

        let receipt = self.write_ratings(winner_id, loser_id).await?;
        info!(
            "Recorded vote: {} beat {} (expected {:.3}, now {} vs {})",
            winner_id, loser_id, receipt.winner_expected, receipt.winner.elo, receipt.loser.elo
        );

        let outcome = DuelOutcome {
            winner_race_id: winner_id,
            loser_race_id: loser_id,
            winner_expected: receipt.winner_expected,
        };
        if let Err(e) = self.ratings.append_outcome(&outcome).await {
            warn!("Failed to record duel outcome: {:#}", e);
            if let Some(metrics) = &self.metrics {
                metrics.record_outcome_log_failure();
            }
        }

        Ok(receipt)
    }

    /// Read, compute and write both records, retrying on conflict
    async fn write_ratings(&self, winner_id: RaceId, loser_id: RaceId) -> Result<VoteReceipt> {
        let max_attempts = self.settings.max_swap_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;

            let records = self.ratings.get_ratings_for(&[winner_id, loser_id]).await?;
            let (winner, loser) = pick_records(records, winner_id, loser_id)?;
            let (next_winner, next_loser, winner_expected) =
                apply_vote(&winner, &loser, self.settings.k_factor, Utc::now());

            let receipt = VoteReceipt {
                winner: next_winner.clone(),
                loser: next_loser.clone(),
                winner_expected,
                attempts,
            };

            if !self.settings.conditional_writes {
                self.ratings.upsert_ratings(&[next_winner, next_loser]).await?;
                return Ok(receipt);
            }

            let updates = [
                RatingUpdate {
                    previous: winner,
                    next: next_winner,
                },
                RatingUpdate {
                    previous: loser,
                    next: next_loser,
                },
            ];
            match self.ratings.swap_ratings(&updates).await? {
                SwapOutcome::Applied => return Ok(receipt),
                SwapOutcome::Conflict if attempts < max_attempts => {
                    debug!(
                        "Ratings for {} and {} changed during vote, retrying (attempt {})",
                        winner_id, loser_id, attempts
                    );
                }
                SwapOutcome::Conflict => {
                    warn!(
                        "Giving up on vote {} over {} after {} conflicting writes",
                        winner_id, loser_id, attempts
                    );
                    return Err(DuelError::Conflict { attempts }.into());
                }
            }
        }
    }
}

fn pick_records(
    records: Vec<RatingRecord>,
    winner_id: RaceId,
    loser_id: RaceId,
) -> Result<(RatingRecord, RatingRecord)> {
    let mut winner = None;
    let mut loser = None;
    for record in records {
        if record.race_id == winner_id {
            winner = Some(record);
        } else if record.race_id == loser_id {
            loser = Some(record);
        }
    }

    match (winner, loser) {
        (Some(winner), Some(loser)) => Ok((winner, loser)),
        (winner, loser) => {
            let found = usize::from(winner.is_some()) + usize::from(loser.is_some());
            let ids = [(winner_id, winner), (loser_id, loser)]
                .into_iter()
                .filter(|(_, record)| record.is_none())
                .map(|(id, _)| id)
                .collect();
            Err(DuelError::NotFound {
                ids,
                requested: 2,
                found,
            }
            .into())
        }
    }
}
