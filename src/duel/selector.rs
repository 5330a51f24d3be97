//! Duel selection
//!
//! Merges race summaries with the current rating view and picks two distinct
//! races uniformly at random. No pairing history is kept, so repeats across
//! calls are expected.

use crate::dataset::DatasetCache;
use crate::error::{DuelError, Result};
use crate::metrics::MetricsCollector;
use crate::rating::RatingStoreAdapter;
use crate::types::{
    DuelPair, EventSummary, LeaderboardEntry, RaceId, RatedEvent, Ranking, RatingRecord, RatingSeed,
};
use rand::seq::index;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Attach a rating to every summary: live elo if present, else the seed
/// elo, else `default_rating`
pub fn merge_ratings(
    summaries: &[EventSummary],
    records: &[RatingRecord],
    seeds: &[RatingSeed],
    default_rating: f64,
) -> Vec<RatedEvent> {
    let live: HashMap<RaceId, f64> = records.iter().map(|r| (r.race_id, r.elo)).collect();
    let seeded: HashMap<RaceId, f64> = seeds.iter().map(|s| (s.race_id, s.elo_seed)).collect();

    summaries
        .iter()
        .map(|summary| {
            let elo = live
                .get(&summary.race_id)
                .or_else(|| seeded.get(&summary.race_id))
                .copied()
                .unwrap_or(default_rating);
            RatedEvent {
                summary: summary.clone(),
                elo,
            }
        })
        .collect()
}

/// Order two leaderboard entries by `ranking`, best first
fn compare_entries(ranking: Ranking, a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    match ranking {
        Ranking::Elo => b.elo.total_cmp(&a.elo),
        Ranking::UniqueStrategy => b
            .summary
            .unique_strategy_share
            .total_cmp(&a.summary.unique_strategy_share),
        Ranking::MaxRegret => b
            .summary
            .max_regret_seconds
            .total_cmp(&a.summary.max_regret_seconds),
        Ranking::Dnf => b.summary.dnf_count.cmp(&a.summary.dnf_count),
    }
}

/// Pick two distinct events uniformly at random without replacement
pub fn choose_pair<R: Rng + ?Sized>(rng: &mut R, events: &[RatedEvent]) -> Result<DuelPair> {
    if events.len() < 2 {
        return Err(DuelError::InsufficientData {
            available: events.len(),
        }
        .into());
    }

    let picked = index::sample(rng, events.len(), 2);
    Ok(DuelPair {
        race_a: events[picked.index(0)].clone(),
        race_b: events[picked.index(1)].clone(),
    })
}

/// Serves duels and the leaderboard from the dataset and rating view
pub struct DuelSelector {
    datasets: Arc<DatasetCache>,
    ratings: Arc<RatingStoreAdapter>,
    default_rating: f64,
    metrics: Option<Arc<MetricsCollector>>,
}

impl DuelSelector {
    pub fn new(datasets: Arc<DatasetCache>, ratings: Arc<RatingStoreAdapter>, default_rating: f64) -> Self {
        Self {
            datasets,
            ratings,
            default_rating,
            metrics: None,
        }
    }

    /// Attach a metrics collector
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Every summary with its current rating
    pub async fn rated_events(&self) -> Result<Vec<RatedEvent>> {
        let dataset = self.datasets.get().await?;
        let records = self.ratings.list_ratings().await?;
        let seeds = dataset.seeds().unwrap_or_default();

        Ok(merge_ratings(
            &dataset.summaries,
            &records,
            seeds,
            self.default_rating,
        ))
    }

    /// Pick a random duel using the thread-local RNG
    pub async fn pick_duel(&self) -> Result<DuelPair> {
        let events = self.rated_events().await?;
        let pair = choose_pair(&mut rand::thread_rng(), &events)?;

        debug!(
            "Serving duel {} vs {} from {} races",
            pair.race_a.summary.race_id,
            pair.race_b.summary.race_id,
            events.len()
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_duel_served(events.len());
        }
        Ok(pair)
    }

    /// Races that have a rating record, best first under `ranking`
    pub async fn leaderboard(
        &self,
        ranking: Ranking,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>> {
        let dataset = self.datasets.get().await?;
        let records = self.ratings.list_ratings().await?;
        let by_id: HashMap<RaceId, &RatingRecord> =
            records.iter().map(|record| (record.race_id, record)).collect();

        let mut entries: Vec<LeaderboardEntry> = dataset
            .summaries
            .iter()
            .filter_map(|summary| {
                by_id.get(&summary.race_id).map(|record| LeaderboardEntry {
                    summary: summary.clone(),
                    elo: record.elo,
                    wins: record.wins,
                    losses: record.losses,
                })
            })
            .collect();

        entries.sort_by(|a, b| compare_entries(ranking, a, b));
        entries.truncate(limit);
        Ok(entries)
    }
}
