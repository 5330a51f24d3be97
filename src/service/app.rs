//! Main application state and service coordination
//!
//! This module contains the AppState that wires the dataset cache, the
//! rating store adapter, the duel selector and the vote processor together.

use crate::config::AppConfig;
use crate::dataset::{DatasetCache, DatasetLoader};
use crate::duel::{DuelSelector, VoteProcessor, VoteSettings};
use crate::metrics::MetricsCollector;
use crate::rating::{RatingStore, RatingStoreAdapter, RestRatingStore, RestStoreConfig, SeedRatingSource};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },
}

/// Shared state behind every request
pub struct AppState {
    config: AppConfig,
    datasets: Arc<DatasetCache>,
    ratings: Arc<RatingStoreAdapter>,
    selector: DuelSelector,
    votes: VoteProcessor,
    metrics: Arc<MetricsCollector>,
    started_at: Instant,
}

impl AppState {
    /// Build the service from configuration. A REST store is used when both
    /// store credentials are set; otherwise reads come from seeds and votes
    /// are rejected.
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        let live = match config.store.credentials() {
            Some((url, api_key)) => {
                info!("Using rating store at {}", url);
                let store = RestRatingStore::new(RestStoreConfig {
                    base_url: url.to_string(),
                    api_key: api_key.to_string(),
                    timeout: config.store.timeout(),
                })
                .map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create rating store client: {}", e),
                })?;
                Some(Arc::new(store) as Arc<dyn RatingStore>)
            }
            None => {
                warn!("No rating store configured: serving seed ratings, votes are disabled");
                None
            }
        };

        Self::with_store(config, live)
    }

    /// Build the service around an already constructed live store
    pub fn with_store(
        config: AppConfig,
        live: Option<Arc<dyn RatingStore>>,
    ) -> Result<Self, ServiceError> {
        crate::config::validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics = Arc::new(
            MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            })?,
        );

        let loader = DatasetLoader::new(config.data.summaries_path(), config.data.seeds_path());
        info!(
            "Reading race data from {} and {}",
            loader.summaries_path().display(),
            loader.seeds_path().display()
        );
        let datasets = Arc::new(DatasetCache::new(loader, config.data.cache_ttl()));

        let seed: Arc<dyn RatingStore> = Arc::new(SeedRatingSource::new(datasets.clone()));
        let ratings = Arc::new(
            RatingStoreAdapter::new(live, seed, config.store.timeout()).with_metrics(metrics.clone()),
        );

        let selector = DuelSelector::new(datasets.clone(), ratings.clone(), config.rating.default_rating)
            .with_metrics(metrics.clone());
        let votes = VoteProcessor::new(ratings.clone(), VoteSettings::from(&config))
            .with_metrics(metrics.clone());

        Ok(Self {
            config,
            datasets,
            ratings,
            selector,
            votes,
            metrics,
            started_at: Instant::now(),
        })
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn datasets(&self) -> &Arc<DatasetCache> {
        &self.datasets
    }

    pub fn ratings(&self) -> &Arc<RatingStoreAdapter> {
        &self.ratings
    }

    pub fn selector(&self) -> &DuelSelector {
        &self.selector
    }

    pub fn votes(&self) -> &VoteProcessor {
        &self.votes
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Seconds since the state was built
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
