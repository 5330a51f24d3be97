//! Elo rating arithmetic and rating storage
//!
//! This module provides the Elo update rules, the storage interface with its
//! in-memory, seed-derived and REST implementations, and the adapter that
//! composes them into the single rating path used by duels and votes.

pub mod adapter;
pub mod elo;
pub mod rest;
pub mod seed;
pub mod storage;

// Re-export commonly used types
pub use adapter::{choose_source, FallbackReason, RatingStoreAdapter, SourceDecision, StoreAvailability};
pub use elo::{duel_ratings, expected_score, update_rating, Outcome, DEFAULT_K_FACTOR};
pub use rest::{RestRatingStore, RestStoreConfig};
pub use seed::{records_from_seeds, SeedRatingSource};
pub use storage::{FailureMode, InMemoryRatingStore, RatingStore};

#[cfg(test)]
pub use storage::MockRatingStore;
