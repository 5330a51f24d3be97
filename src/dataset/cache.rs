//! Time-boxed dataset cache
//!
//! The CSV files are read-only inputs, so a parsed snapshot can be shared
//! between requests for `ttl`. Concurrent misses wait on the same load.
//! `invalidate` forces the next request to reload. Load errors are never
//! cached. Rating records are never cached here.

use crate::dataset::loader::{Dataset, DatasetLoader};
use crate::error::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

struct CachedDataset {
    loaded_at: Instant,
    dataset: Arc<Dataset>,
}

/// Shared, explicitly scoped cache over a [`DatasetLoader`]
pub struct DatasetCache {
    loader: DatasetLoader,
    ttl: Duration,
    slot: Mutex<Option<CachedDataset>>,
}

impl DatasetCache {
    /// Create a cache; a zero `ttl` disables caching
    pub fn new(loader: DatasetLoader, ttl: Duration) -> Self {
        Self {
            loader,
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn loader(&self) -> &DatasetLoader {
        &self.loader
    }

    /// Current snapshot, loading it if absent or expired
    pub async fn get(&self) -> Result<Arc<Dataset>> {
        if self.ttl.is_zero() {
            return Ok(Arc::new(self.loader.load().await?));
        }

        // Held across the load so concurrent misses share one read
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(cached.dataset.clone());
            }
            debug!("Dataset cache expired after {:?}", self.ttl);
        }

        let dataset = Arc::new(self.loader.load().await?);
        *slot = Some(CachedDataset {
            loaded_at: Instant::now(),
            dataset: dataset.clone(),
        });
        Ok(dataset)
    }

    /// Drop the cached snapshot
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}
