//! Common types used throughout the duel service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for race events
pub type RaceId = i64;

/// Descriptive metrics for one race event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub race_id: RaceId,
    pub season: i64,
    pub round: i64,
    pub race_name: String,
    pub summary_text: String,
    pub youtube_highlights_url: String,
    /// Fraction of drivers on a unique strategy, in [0, 1]
    pub unique_strategy_share: f64,
    pub avg_stops_per_driver: f64,
    pub dnf_count: u32,
    pub max_regret_seconds: f64,
    pub top_mover: Option<String>,
    pub top_mover_gain: Option<f64>,
}

/// Offline-computed starting point for a race's rating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSeed {
    pub race_id: RaceId,
    pub season: i64,
    pub round: i64,
    pub race_name: String,
    pub prior_score: f64,
    pub elo_seed: f64,
    pub logit_seed: f64,
}

/// Live, mutable rating state for a race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingRecord {
    pub race_id: RaceId,
    pub season: i64,
    pub round: i64,
    pub race_name: String,
    pub wins: u32,
    pub losses: u32,
    pub elo: f64,
    pub prior_score: f64,
    pub logit_seed: f64,
    pub updated_at: DateTime<Utc>,
}

impl RatingRecord {
    /// Create an unplayed record from a seed
    pub fn from_seed(seed: &RatingSeed, now: DateTime<Utc>) -> Self {
        Self {
            race_id: seed.race_id,
            season: seed.season,
            round: seed.round,
            race_name: seed.race_name.clone(),
            wins: 0,
            losses: 0,
            elo: seed.elo_seed,
            prior_score: seed.prior_score,
            logit_seed: seed.logit_seed,
            updated_at: now,
        }
    }

    /// True when `other` carries the same rating state (ignores metadata)
    pub fn same_state(&self, other: &RatingRecord) -> bool {
        self.race_id == other.race_id
            && self.wins == other.wins
            && self.losses == other.losses
            && self.elo == other.elo
    }
}

/// Append-only log entry for a resolved vote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuelOutcome {
    pub winner_race_id: RaceId,
    pub loser_race_id: RaceId,
    /// Winner's expected score before the update was applied
    pub winner_expected: f64,
}

/// A conditional write: replace `previous` with `next` only if the stored
/// record still matches `previous`
#[derive(Debug, Clone, PartialEq)]
pub struct RatingUpdate {
    pub previous: RatingRecord,
    pub next: RatingRecord,
}

/// Result of a conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    Applied,
    Conflict,
}

/// A race as shown in a duel: its summary plus current rating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatedEvent {
    #[serde(flatten)]
    pub summary: EventSummary,
    pub elo: f64,
}

/// Two distinct races to be voted on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuelPair {
    pub race_a: RatedEvent,
    pub race_b: RatedEvent,
}

/// Leaderboard row: summary plus the full rating counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    #[serde(flatten)]
    pub summary: EventSummary,
    pub elo: f64,
    pub wins: u32,
    pub losses: u32,
}

/// Leaderboard orderings, each descending on its key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ranking {
    #[default]
    Elo,
    UniqueStrategy,
    MaxRegret,
    Dnf,
}

impl Ranking {
    /// Number of entries returned when no limit is given
    pub fn default_limit(self) -> usize {
        match self {
            Ranking::Dnf => 5,
            _ => 10,
        }
    }
}

/// Vote request body as received over HTTP
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub winner_race_id: Option<RaceId>,
    pub loser_race_id: Option<RaceId>,
}
