//! Configuration management for the race-duel service
//!
//! This module handles all configuration loading from environment variables and
//! TOML files, validation, and default values.

pub mod app;

// Re-export commonly used types
pub use app::{
    validate_config, AppConfig, DataSettings, RatingSettings, ServiceSettings, StoreSettings,
    SEEDS_FILE_NAME, SUMMARIES_FILE_NAME,
};
