//! Health check reporting
//!
//! This module provides health check functionality for the race-duel
//! service, covering the datasets and the rating store.

use crate::rating::StoreAvailability;
use crate::service::app::AppState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Optional detail when not healthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Races in the current dataset snapshot
    pub races_loaded: usize,
    /// Whether votes can be recorded
    pub store_configured: bool,
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(app_state: &AppState) -> Result<Self> {
        let mut checks = Vec::new();

        let (dataset_check, races_loaded) = Self::check_dataset(app_state).await;
        checks.push(dataset_check);
        checks.push(Self::check_rating_store(app_state).await);

        let status = Self::overall_status(&checks);
        debug!("Health check completed: {}", status);

        Ok(HealthCheck {
            status,
            service: app_state.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats: ServiceStats {
                races_loaded,
                store_configured: app_state.ratings().is_configured(),
                uptime_seconds: app_state.uptime_seconds(),
            },
        })
    }

    /// Readiness check: duels can be served once the race summaries load
    pub async fn readiness_check(app_state: &AppState) -> Result<HealthStatus> {
        let (dataset_check, _) = Self::check_dataset(app_state).await;
        Ok(match dataset_check.status {
            HealthStatus::Unhealthy => HealthStatus::Unhealthy,
            _ => HealthStatus::Healthy,
        })
    }

    /// Worst component status wins
    fn overall_status(checks: &[ComponentCheck]) -> HealthStatus {
        if checks.iter().any(|c| c.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if checks.iter().any(|c| c.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    async fn check_dataset(app_state: &AppState) -> (ComponentCheck, usize) {
        let start = Instant::now();
        let (status, message, races) = match app_state.datasets().get().await {
            Ok(dataset) => match &dataset.seed_error {
                None => (HealthStatus::Healthy, None, dataset.summaries.len()),
                Some(e) => (
                    HealthStatus::Degraded,
                    Some(format!("Rating seeds unavailable: {}", e)),
                    dataset.summaries.len(),
                ),
            },
            Err(e) => (HealthStatus::Unhealthy, Some(format!("{:#}", e)), 0),
        };

        (
            ComponentCheck {
                name: "dataset".to_string(),
                status,
                message,
                duration_ms: start.elapsed().as_millis() as u64,
            },
            races,
        )
    }

    async fn check_rating_store(app_state: &AppState) -> ComponentCheck {
        let start = Instant::now();
        let (status, message) = match app_state.ratings().availability().await {
            StoreAvailability::Healthy => (HealthStatus::Healthy, None),
            StoreAvailability::Degraded => (
                HealthStatus::Degraded,
                Some("Rating store unreachable, serving seed ratings".to_string()),
            ),
            StoreAvailability::Unconfigured => (
                HealthStatus::Degraded,
                Some("No rating store configured, votes are disabled".to_string()),
            ),
        };

        ComponentCheck {
            name: "rating_store".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}
