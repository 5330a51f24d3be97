//! Elo rating arithmetic
//!
//! Thin wrapper over the skillratings Elo implementation. Ratings are never
//! clamped or rounded here; rounding happens when a record is persisted.

use serde::{Deserialize, Serialize};
use skillratings::elo::{elo, expected_score as elo_expected_score, EloConfig, EloRating};
use skillratings::Outcomes;

/// Default K-factor for race duels
pub const DEFAULT_K_FACTOR: f64 = 24.0;

/// Result of a duel from one side's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Draw,
    Loss,
}

impl Outcome {
    /// Score value of the outcome (1, 0.5 or 0)
    pub fn score(self) -> f64 {
        match self {
            Outcome::Win => 1.0,
            Outcome::Draw => 0.5,
            Outcome::Loss => 0.0,
        }
    }
}

impl From<Outcome> for Outcomes {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Win => Outcomes::WIN,
            Outcome::Draw => Outcomes::DRAW,
            Outcome::Loss => Outcomes::LOSS,
        }
    }
}

/// Probability that a player rated `rating_a` beats one rated `rating_b`
pub fn expected_score(rating_a: f64, rating_b: f64) -> f64 {
    let (expected_a, _) = elo_expected_score(
        &EloRating { rating: rating_a },
        &EloRating { rating: rating_b },
    );
    expected_a
}

/// New rating for `rating` after `outcome` against `opponent_rating`
pub fn update_rating(rating: f64, opponent_rating: f64, outcome: Outcome, k_factor: f64) -> f64 {
    let (updated, _) = elo(
        &EloRating { rating },
        &EloRating {
            rating: opponent_rating,
        },
        &outcome.into(),
        &EloConfig { k: k_factor },
    );
    updated.rating
}

/// Simultaneous two-player update. Both new ratings come from the
/// pre-update values.
pub fn duel_ratings(winner_rating: f64, loser_rating: f64, k_factor: f64) -> (f64, f64) {
    (
        update_rating(winner_rating, loser_rating, Outcome::Win, k_factor),
        update_rating(loser_rating, winner_rating, Outcome::Loss, k_factor),
    )
}
