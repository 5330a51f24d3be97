//! Race Duel - pairwise-vote Elo ranking for race events
//!
//! This crate serves random duels between race events, records which race
//! voters preferred, and keeps an Elo rating per race in a remote store with
//! a read-only fallback to offline seed ratings.

pub mod config;
pub mod dataset;
pub mod duel;
pub mod error;
pub mod metrics;
pub mod rating;
pub mod service;
pub mod types;

// Re-export commonly used types and traits
pub use error::{DuelError, Result};
pub use types::*;

// Re-export key components
pub use duel::{DuelSelector, VoteProcessor};
pub use rating::{RatingStore, RatingStoreAdapter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
