//! Metrics and monitoring for the race-duel service
//!
//! This module provides Prometheus metrics collection for duels, votes and
//! rating store behaviour, plus the text encoder used by `/metrics`.

pub mod collector;

pub use collector::{DuelMetrics, MetricsCollector, StoreMetrics};

use anyhow::Result;
use prometheus::{Encoder, TextEncoder};

/// Encode every registered metric in Prometheus text format
pub fn encode_metrics(collector: &MetricsCollector) -> Result<(String, String)> {
    let metric_families = collector.registry().gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok((encoder.format_type().to_string(), String::from_utf8(buffer)?))
}
