//! Remote rating store over a PostgREST-compatible HTTP API
//!
//! Tables `race_ratings` and `duels`, plus the `swap_race_ratings` function
//! for conditional writes, are defined in `sql/schema.sql`.

use crate::error::{DuelError, Result};
use crate::rating::storage::RatingStore;
use crate::types::{DuelOutcome, RaceId, RatingRecord, RatingUpdate, SwapOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const RATINGS_TABLE: &str = "race_ratings";
const DUELS_TABLE: &str = "duels";
const SWAP_FUNCTION: &str = "swap_race_ratings";
const RATING_COLUMNS: &str =
    "race_id,season,round,race_name,wins,losses,elo,prior_score,logit_seed,updated_at";

/// Rating used when the store holds a null elo
const NULL_ELO_RATING: f64 = 1500.0;

/// Row shape of the `race_ratings` table
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RatingRow {
    race_id: RaceId,
    #[serde(default)]
    season: i64,
    #[serde(default)]
    round: i64,
    #[serde(default)]
    race_name: Option<String>,
    #[serde(default)]
    wins: Option<u32>,
    #[serde(default)]
    losses: Option<u32>,
    #[serde(default)]
    elo: Option<f64>,
    #[serde(default)]
    prior_score: Option<f64>,
    #[serde(default)]
    logit_seed: Option<f64>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl From<RatingRow> for RatingRecord {
    fn from(row: RatingRow) -> Self {
        Self {
            race_id: row.race_id,
            season: row.season,
            round: row.round,
            race_name: row.race_name.unwrap_or_default(),
            wins: row.wins.unwrap_or_default(),
            losses: row.losses.unwrap_or_default(),
            elo: row.elo.unwrap_or(NULL_ELO_RATING),
            prior_score: row.prior_score.unwrap_or_default(),
            logit_seed: row.logit_seed.unwrap_or_default(),
            updated_at: row.updated_at.unwrap_or_else(Utc::now),
        }
    }
}

impl From<&RatingRecord> for RatingRow {
    fn from(record: &RatingRecord) -> Self {
        Self {
            race_id: record.race_id,
            season: record.season,
            round: record.round,
            race_name: Some(record.race_name.clone()),
            wins: Some(record.wins),
            losses: Some(record.losses),
            elo: Some(record.elo),
            prior_score: Some(record.prior_score),
            logit_seed: Some(record.logit_seed),
            updated_at: Some(record.updated_at),
        }
    }
}

/// One element of the `swap_race_ratings` argument
#[derive(Debug, Serialize)]
struct SwapRow {
    race_id: RaceId,
    expected_elo: f64,
    expected_wins: u32,
    expected_losses: u32,
    elo: f64,
    wins: u32,
    losses: u32,
}

#[derive(Debug, Serialize)]
struct SwapArgs {
    updates: Vec<SwapRow>,
}

#[derive(Debug, Serialize)]
struct DuelRow {
    winner_race_id: RaceId,
    loser_race_id: RaceId,
    winner_expected: f64,
}

/// Configuration for the REST store
#[derive(Debug, Clone)]
pub struct RestStoreConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

/// PostgREST-backed rating store
pub struct RestRatingStore {
    client: Client,
    config: RestStoreConfig,
}

impl RestRatingStore {
    /// Create a new REST store client
    pub fn new(config: RestStoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DuelError::Configuration {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            path
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }

    async fn fetch(&self, filter: Option<String>) -> Result<Vec<RatingRecord>> {
        let mut query = vec![("select".to_string(), RATING_COLUMNS.to_string())];
        if let Some(filter) = filter {
            query.push(("race_id".to_string(), filter));
        }

        let response = self
            .authorized(self.client.get(self.url(RATINGS_TABLE)))
            .query(&query)
            .send()
            .await
            .map_err(|e| DuelError::Store {
                message: format!("request failed: {}", e),
            })?;
        let response = check_status(response)
            .await
            .map_err(|message| DuelError::Store { message })?;

        let rows: Vec<RatingRow> = response.json().await.map_err(|e| DuelError::Store {
            message: format!("unexpected response body: {}", e),
        })?;
        Ok(rows.into_iter().map(RatingRecord::from).collect())
    }
}

/// Turn a non-success response into an error message carrying its body
async fn check_status(response: Response) -> std::result::Result<Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(format!("store returned {}: {}", status, body))
}

#[async_trait]
impl RatingStore for RestRatingStore {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn list_ratings(&self) -> Result<Vec<RatingRecord>> {
        self.fetch(None).await
    }

    async fn get_ratings(&self, race_ids: &[RaceId]) -> Result<Vec<RatingRecord>> {
        let ids: Vec<String> = race_ids.iter().map(|id| id.to_string()).collect();
        self.fetch(Some(format!("in.({})", ids.join(",")))).await
    }

    async fn upsert_ratings(&self, records: &[RatingRecord]) -> Result<()> {
        let rows: Vec<RatingRow> = records.iter().map(RatingRow::from).collect();

        // A single bulk request runs in one transaction
        let response = self
            .authorized(self.client.post(self.url(RATINGS_TABLE)))
            .query(&[("on_conflict", "race_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&rows)
            .send()
            .await
            .map_err(|e| DuelError::Persistence {
                message: format!("request failed: {}", e),
            })?;
        check_status(response)
            .await
            .map_err(|message| DuelError::Persistence { message })?;

        debug!("Upserted {} rating rows", rows.len());
        Ok(())
    }

    async fn swap_ratings(&self, updates: &[RatingUpdate]) -> Result<SwapOutcome> {
        let args = SwapArgs {
            updates: updates
                .iter()
                .map(|update| SwapRow {
                    race_id: update.next.race_id,
                    expected_elo: update.previous.elo,
                    expected_wins: update.previous.wins,
                    expected_losses: update.previous.losses,
                    elo: update.next.elo,
                    wins: update.next.wins,
                    losses: update.next.losses,
                })
                .collect(),
        };

        let response = self
            .authorized(self.client.post(self.url(&format!("rpc/{}", SWAP_FUNCTION))))
            .json(&args)
            .send()
            .await
            .map_err(|e| DuelError::Persistence {
                message: format!("request failed: {}", e),
            })?;
        let response = check_status(response)
            .await
            .map_err(|message| DuelError::Persistence { message })?;

        let applied: bool = response.json().await.map_err(|e| DuelError::Persistence {
            message: format!("unexpected response body: {}", e),
        })?;
        Ok(if applied {
            SwapOutcome::Applied
        } else {
            SwapOutcome::Conflict
        })
    }

    async fn append_outcome(&self, outcome: &DuelOutcome) -> Result<()> {
        let row = DuelRow {
            winner_race_id: outcome.winner_race_id,
            loser_race_id: outcome.loser_race_id,
            winner_expected: outcome.winner_expected,
        };

        let response = self
            .authorized(self.client.post(self.url(DUELS_TABLE)))
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await
            .map_err(|e| DuelError::OutcomeLog {
                message: format!("request failed: {}", e),
            })?;
        check_status(response)
            .await
            .map_err(|message| DuelError::OutcomeLog { message })?;
        Ok(())
    }
}
