//! Service layer for the race-duel API
//!
//! This module contains the application state, the HTTP server and the
//! health checks.

pub mod app;
pub mod health;
pub mod http;

pub use app::{AppState, ServiceError};
pub use health::{ComponentCheck, HealthCheck, HealthStatus, ServiceStats};
pub use http::{create_router, ApiError, HttpServer};
