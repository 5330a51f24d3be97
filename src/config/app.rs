//! Main application configuration
//!
//! This module defines the primary configuration structures for the race-duel
//! service, including environment variable loading and validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// File name of the race summaries dataset inside the data directory
pub const SUMMARIES_FILE_NAME: &str = "race_summaries.csv";

/// File name of the rating seed dataset inside the data directory
pub const SEEDS_FILE_NAME: &str = "race_duel_seed.csv";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub data: DataSettings,
    pub store: StoreSettings,
    pub rating: RatingSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Host the HTTP server binds to
    pub http_host: String,
    /// Port for the duel API, health and metrics endpoints
    pub http_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Dataset location and caching
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Directory holding `race_summaries.csv` and `race_duel_seed.csv`
    pub data_dir: PathBuf,
    /// How long a loaded dataset is reused; 0 reloads on every request
    pub cache_ttl_seconds: u64,
}

/// Remote rating store (PostgREST-compatible) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Base URL of the store; `None` runs in seed-only mode
    pub url: Option<String>,
    /// Service credential; `None` runs in seed-only mode
    pub api_key: Option<String>,
    /// Timeout applied to every store call
    pub timeout_ms: u64,
    /// Use compare-and-swap writes for votes
    pub conditional_writes: bool,
    /// Attempts before a conflicting vote is rejected
    pub max_swap_attempts: u32,
}

/// Rating arithmetic settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingSettings {
    pub k_factor: f64,
    /// Rating used for races with neither a live record nor a seed
    pub default_rating: f64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "race-duel".to_string(),
            log_level: "info".to_string(),
            http_host: "0.0.0.0".to_string(),
            http_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("..").join("data").join("processed"),
            cache_ttl_seconds: 60,
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_ms: 5000,
            conditional_writes: true,
            max_swap_attempts: 3,
        }
    }
}

impl Default for RatingSettings {
    fn default() -> Self {
        Self {
            k_factor: 24.0,
            default_rating: 1500.0,
        }
    }
}

impl StoreSettings {
    /// Store credentials, present only when both URL and key are set
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.url.as_deref(), self.api_key.as_deref()) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => Some((url, key)),
            _ => None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl DataSettings {
    pub fn summaries_path(&self) -> PathBuf {
        self.data_dir.join(SUMMARIES_FILE_NAME)
    }

    pub fn seeds_path(&self) -> PathBuf {
        self.data_dir.join(SEEDS_FILE_NAME)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(host) = env::var("HTTP_HOST") {
            self.service.http_host = host;
        }
        if let Ok(port) = env::var("HTTP_PORT") {
            self.service.http_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HTTP_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Dataset settings
        if let Ok(dir) = env::var("RACE_DATA_DIR") {
            self.data.data_dir = PathBuf::from(dir);
        }
        if let Ok(ttl) = env::var("DATASET_CACHE_TTL_SECONDS") {
            self.data.cache_ttl_seconds = ttl
                .parse()
                .map_err(|_| anyhow!("Invalid DATASET_CACHE_TTL_SECONDS value: {}", ttl))?;
        }

        // Store settings
        if let Ok(url) = env::var("SUPABASE_URL") {
            self.store.url = Some(url);
        }
        if let Ok(key) = env::var("SUPABASE_SERVICE_ROLE_KEY") {
            self.store.api_key = Some(key);
        }
        if let Ok(timeout) = env::var("STORE_TIMEOUT_MS") {
            self.store.timeout_ms = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid STORE_TIMEOUT_MS value: {}", timeout))?;
        }
        if let Ok(conditional) = env::var("STORE_CONDITIONAL_WRITES") {
            self.store.conditional_writes = conditional.parse().map_err(|_| {
                anyhow!("Invalid STORE_CONDITIONAL_WRITES value: {}", conditional)
            })?;
        }
        if let Ok(attempts) = env::var("STORE_MAX_SWAP_ATTEMPTS") {
            self.store.max_swap_attempts = attempts
                .parse()
                .map_err(|_| anyhow!("Invalid STORE_MAX_SWAP_ATTEMPTS value: {}", attempts))?;
        }

        // Rating settings
        if let Ok(k) = env::var("RATING_K_FACTOR") {
            self.rating.k_factor = k
                .parse()
                .map_err(|_| anyhow!("Invalid RATING_K_FACTOR value: {}", k))?;
        }
        if let Ok(default_rating) = env::var("RATING_DEFAULT") {
            self.rating.default_rating = default_rating
                .parse()
                .map_err(|_| anyhow!("Invalid RATING_DEFAULT value: {}", default_rating))?;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    if config.store.timeout_ms == 0 {
        return Err(anyhow!("Store timeout must be greater than 0"));
    }
    if config.store.max_swap_attempts == 0 {
        return Err(anyhow!("Max swap attempts must be at least 1"));
    }

    // Either half of the credential alone leaves the store unconfigured
    match (&config.store.url, &config.store.api_key) {
        (Some(_), None) => warn!(
            "SUPABASE_URL set without SUPABASE_SERVICE_ROLE_KEY; votes will be rejected until configured"
        ),
        (None, Some(_)) => warn!("SUPABASE_SERVICE_ROLE_KEY set without SUPABASE_URL; ignoring"),
        _ => {}
    }

    if !(config.rating.k_factor.is_finite() && config.rating.k_factor > 0.0) {
        return Err(anyhow!("K-factor must be positive"));
    }
    if !config.rating.default_rating.is_finite() {
        return Err(anyhow!("Default rating must be finite"));
    }

    Ok(())
}
