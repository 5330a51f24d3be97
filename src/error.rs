//! Error types for the duel service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application. Library functions return `anyhow::Result` carrying
//! a [`DuelError`] so the HTTP boundary can downcast and pick a status code.

use crate::types::RaceId;

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific duel scenarios
#[derive(Debug, Clone, thiserror::Error)]
pub enum DuelError {
    #[error("Failed to parse {file}: {}", .errors.join("; "))]
    Parse { file: String, errors: Vec<String> },

    #[error("Invalid vote: {reason}")]
    InvalidVote { reason: String },

    #[error("Invalid query: {reason}")]
    InvalidQuery { reason: String },

    #[error("Expected to find {requested} race ratings, found {found} (ids: {ids:?})")]
    NotFound {
        ids: Vec<RaceId>,
        requested: usize,
        found: usize,
    },

    #[error("Not enough races to run a duel: {available} available")]
    InsufficientData { available: usize },

    #[error("A rating store must be configured to record duels")]
    StoreRequired,

    #[error("Rating store read failed: {message}")]
    Store { message: String },

    #[error("Failed to update ratings: {message}")]
    Persistence { message: String },

    #[error("Ratings changed concurrently; gave up after {attempts} attempts")]
    Conflict { attempts: u32 },

    #[error("Failed to record duel outcome: {message}")]
    OutcomeLog { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl DuelError {
    /// Find the `DuelError` inside an anyhow chain, if any
    pub fn find(err: &anyhow::Error) -> Option<&DuelError> {
        err.chain().find_map(|cause| cause.downcast_ref::<DuelError>())
    }
}
