//! HTTP API, health and metrics endpoints
//!
//! Serves the duel API (`GET /duel`, `POST /duel`), the leaderboard
//! (`GET /ratings`) and the operational endpoints (`/health`, `/ready`,
//! `/metrics`) from one Axum router.

use crate::error::DuelError;
use crate::metrics::encode_metrics;
use crate::service::app::AppState;
use crate::service::health::{HealthCheck, HealthStatus};
use crate::types::{Ranking, VoteRequest};
use anyhow::{Context, Result};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Error returned by API handlers, rendered as `{ "error": ... }`
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl ApiError {
    /// HTTP status for the error
    pub fn status(&self) -> StatusCode {
        match DuelError::find(&self.0) {
            Some(DuelError::InvalidVote { .. })
            | Some(DuelError::InvalidQuery { .. })
            | Some(DuelError::NotFound { .. }) => StatusCode::BAD_REQUEST,
            Some(DuelError::StoreRequired) => StatusCode::NOT_IMPLEMENTED,
            Some(DuelError::Conflict { .. }) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED {
            error!("Request failed: {:#}", self.0);
        } else {
            debug!("Request rejected: {:#}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Query parameters of `GET /ratings`
#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub by: Option<Ranking>,
    pub limit: Option<usize>,
}

/// Build the Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/duel", get(get_duel_handler).post(post_duel_handler))
        .route("/ratings", get(ratings_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Root endpoint handler - shows service information
async fn root_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "service": state.config().service.name,
        "version": env!("CARGO_PKG_VERSION"),
        "votesEnabled": state.ratings().is_configured(),
        "endpoints": ["/duel", "/ratings", "/health", "/ready", "/metrics"]
    }))
}

async fn get_duel_handler(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let pair = state.selector().pick_duel().await?;
    Ok(Json(pair).into_response())
}

async fn post_duel_handler(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    // Store configuration is checked before the body is looked at
    if !state.ratings().is_configured() {
        state.metrics().record_vote("store_required");
        return Err(DuelError::StoreRequired.into());
    }

    let Json(vote) = body.map_err(|rejection| {
        state.metrics().record_vote("invalid");
        DuelError::InvalidVote {
            reason: rejection.body_text(),
        }
    })?;

    state
        .votes()
        .record_vote(vote.winner_race_id, vote.loser_race_id)
        .await?;
    Ok(Json(json!({ "success": true })).into_response())
}

async fn ratings_handler(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<LeaderboardQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|rejection| DuelError::InvalidQuery {
        reason: rejection.body_text(),
    })?;
    let ranking = query.by.unwrap_or_default();
    let limit = query.limit.unwrap_or_else(|| ranking.default_limit());
    let entries = state.selector().leaderboard(ranking, limit).await?;
    Ok(Json(entries).into_response())
}

/// Health check endpoint handler
async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    debug!("Health check requested");

    match HealthCheck::check(&state).await {
        Ok(health) => {
            let code = match health.status {
                HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::OK,
            };
            (code, Json(health)).into_response()
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// Readiness check endpoint handler
async fn ready_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Readiness check requested");

    match HealthCheck::readiness_check(&state).await {
        Ok(HealthStatus::Unhealthy) => (StatusCode::SERVICE_UNAVAILABLE, "Not ready"),
        Ok(_) => (StatusCode::OK, "Ready"),
        Err(e) => {
            error!("Readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
        }
    }
}

/// Prometheus metrics endpoint handler
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match encode_metrics(state.metrics()) {
        Ok((content_type, body)) => {
            ([(header::CONTENT_TYPE, content_type)], body).into_response()
        }
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

/// HTTP server bound to the configured host and port
pub struct HttpServer {
    addr: String,
    state: Arc<AppState>,
    shutdown_tx: broadcast::Sender<()>,
}

impl HttpServer {
    pub fn new(state: Arc<AppState>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let addr = format!(
            "{}:{}",
            state.config().service.http_host,
            state.config().service.http_port
        );

        Self {
            addr,
            state,
            shutdown_tx,
        }
    }

    /// Serve until `stop` is called
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = self.addr.parse().context("Invalid HTTP server address")?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until `stop` is called
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!("HTTP server listening on http://{}", listener.local_addr()?);

        let app = create_router(self.state.clone());
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("HTTP server shutdown signal received");
            })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }

    /// Ask the server to stop accepting connections
    pub fn stop(&self) {
        if self.shutdown_tx.send(()).is_err() {
            warn!("HTTP server was not running");
        }
    }
}
