//! Test fixtures shared by the integration tests
//!
//! Provides a temporary data directory with both CSV inputs, helpers to
//! build the service around an in-memory store, and a fake PostgREST server
//! for exercising the REST rating store over real HTTP.

#![allow(dead_code)]

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use race_duel::config::AppConfig;
use race_duel::rating::{records_from_seeds, InMemoryRatingStore, RatingStore};
use race_duel::service::AppState;
use race_duel::types::{RaceId, RatingSeed};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const SUMMARY_HEADER: &str = "season,round,race_name,summary_text,youtube_highlights_search,unique_strategy_share,avg_stops_per_driver,dnf_count,max_regret_s,top_mover,top_mover_gain";
pub const SEED_HEADER: &str = "raceId,season,round,race_name,prior_score,elo_seed,logit_seed";

/// One race of the fixture season
#[derive(Debug, Clone)]
pub struct FixtureRace {
    pub race_id: RaceId,
    pub round: i64,
    pub name: &'static str,
    pub elo_seed: f64,
}

pub const SEASON: i64 = 2023;

pub fn fixture_races() -> Vec<FixtureRace> {
    vec![
        FixtureRace {
            race_id: 1,
            round: 1,
            name: "Bahrain Grand Prix",
            elo_seed: 1520.0,
        },
        FixtureRace {
            race_id: 2,
            round: 2,
            name: "Saudi Arabian Grand Prix",
            elo_seed: 1480.0,
        },
        FixtureRace {
            race_id: 3,
            round: 3,
            name: "Australian Grand Prix",
            elo_seed: 1550.0,
        },
        FixtureRace {
            race_id: 4,
            round: 4,
            name: "Azerbaijan Grand Prix",
            elo_seed: 1450.0,
        },
    ]
}

/// Temporary data directory holding `race_summaries.csv` and
/// `race_duel_seed.csv`
pub struct TestDataDir {
    dir: TempDir,
}

impl TestDataDir {
    /// Data directory with the fixture season
    pub fn new() -> Self {
        let races = fixture_races();

        let mut summaries = format!("{}\n", SUMMARY_HEADER);
        let mut seeds = format!("{}\n", SEED_HEADER);
        for race in &races {
            summaries.push_str(&format!(
                "{},{},{},\"A race, with commas\",https://youtube.example/{},0.25,1.8,{},4.5,Driver {},{}\n",
                SEASON, race.round, race.name, race.round, race.round, race.round, race.round
            ));
            seeds.push_str(&format!(
                "{},{},{},{},0.5,{},0.1\n",
                race.race_id, SEASON, race.round, race.name, race.elo_seed
            ));
        }

        Self::with_files(&summaries, &seeds)
    }

    /// Data directory with the given file contents
    pub fn with_files(summaries: &str, seeds: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(dir.path().join("race_summaries.csv"), summaries).expect("write summaries");
        std::fs::write(dir.path().join("race_duel_seed.csv"), seeds).expect("write seeds");
        Self { dir }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn seeds_path(&self) -> PathBuf {
        self.dir.path().join("race_duel_seed.csv")
    }

    pub fn read_seeds(&self) -> String {
        std::fs::read_to_string(self.seeds_path()).expect("read seeds")
    }

    /// Configuration pointing at this directory
    pub fn config(&self) -> AppConfig {
        let mut config = AppConfig::default();
        config.data.data_dir = self.path();
        config
    }
}

/// Seeds matching the fixture season
pub fn fixture_seeds() -> Vec<RatingSeed> {
    fixture_races()
        .into_iter()
        .map(|race| RatingSeed {
            race_id: race.race_id,
            season: SEASON,
            round: race.round,
            race_name: race.name.to_string(),
            prior_score: 0.5,
            elo_seed: race.elo_seed,
            logit_seed: 0.1,
        })
        .collect()
}

/// In-memory store holding unplayed records for the fixture season
pub fn seeded_store() -> Arc<InMemoryRatingStore> {
    Arc::new(InMemoryRatingStore::with_records(records_from_seeds(
        &fixture_seeds(),
    )))
}

/// Application state over `data` with an optional live store
pub fn app_state(data: &TestDataDir, live: Option<Arc<dyn RatingStore>>) -> Arc<AppState> {
    Arc::new(AppState::with_store(data.config(), live).expect("build app state"))
}

/// Shared state of the fake PostgREST server
#[derive(Default)]
pub struct FakePostgrestState {
    pub ratings: Mutex<BTreeMap<RaceId, Value>>,
    pub duels: Mutex<Vec<Value>>,
    pub fail_requests: AtomicBool,
    pub last_api_key: Mutex<Option<String>>,
}

impl FakePostgrestState {
    pub fn set_failing(&self, failing: bool) {
        self.fail_requests.store(failing, Ordering::SeqCst);
    }

    pub fn rating(&self, race_id: RaceId) -> Option<Value> {
        self.ratings.lock().ok()?.get(&race_id).cloned()
    }

    pub fn duels(&self) -> Vec<Value> {
        self.duels.lock().map(|d| d.clone()).unwrap_or_default()
    }

    pub fn insert_row(&self, row: Value) {
        let race_id = row["race_id"].as_i64().expect("race_id");
        self.ratings.lock().expect("ratings lock").insert(race_id, row);
    }
}

type Shared = Arc<FakePostgrestState>;

/// A PostgREST look-alike on an ephemeral local port
pub struct FakePostgrest {
    pub base_url: String,
    pub state: Shared,
}

impl FakePostgrest {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(FakePostgrestState::default());
        let app = Router::new()
            .route("/rest/v1/race_ratings", get(list_rows).post(upsert_rows))
            .route("/rest/v1/duels", post(insert_duel))
            .route("/rest/v1/rpc/swap_race_ratings", post(swap_rows))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake store");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }
}

/// Reject unauthenticated or deliberately failing requests
fn gate(state: &FakePostgrestState, headers: &HeaderMap) -> Option<Response> {
    let api_key = headers
        .get("apikey")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bearer_ok = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .zip(api_key.as_deref())
        .is_some_and(|(auth, key)| auth == format!("Bearer {}", key));

    if let Ok(mut last) = state.last_api_key.lock() {
        *last = api_key.clone();
    }
    if api_key.as_deref().map_or(true, str::is_empty) || !bearer_ok {
        return Some((StatusCode::UNAUTHORIZED, "missing credentials").into_response());
    }
    if state.fail_requests.load(Ordering::SeqCst) {
        return Some(
            (StatusCode::INTERNAL_SERVER_ERROR, r#"{"message":"database unavailable"}"#)
                .into_response(),
        );
    }
    None
}

async fn list_rows(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Some(rejected) = gate(&state, &headers) {
        return rejected;
    }

    let wanted: Option<Vec<RaceId>> = query.get("race_id").and_then(|filter| {
        let ids = filter.strip_prefix("in.(")?.strip_suffix(')')?;
        Some(ids.split(',').filter_map(|id| id.trim().parse().ok()).collect())
    });

    let ratings = state.ratings.lock().expect("ratings lock");
    let rows: Vec<Value> = ratings
        .iter()
        .filter(|(id, _)| wanted.as_ref().map_or(true, |ids| ids.contains(id)))
        .map(|(_, row)| row.clone())
        .collect();
    Json(rows).into_response()
}

async fn upsert_rows(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(rows): Json<Vec<Value>>,
) -> Response {
    if let Some(rejected) = gate(&state, &headers) {
        return rejected;
    }

    let mut ratings = state.ratings.lock().expect("ratings lock");
    for row in rows {
        if let Some(race_id) = row["race_id"].as_i64() {
            ratings.insert(race_id, row);
        }
    }
    StatusCode::CREATED.into_response()
}

async fn swap_rows(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(args): Json<Value>,
) -> Response {
    if let Some(rejected) = gate(&state, &headers) {
        return rejected;
    }

    let updates = args["updates"].as_array().cloned().unwrap_or_default();
    let mut ratings = state.ratings.lock().expect("ratings lock");

    let matches = updates.iter().all(|update| {
        update["race_id"]
            .as_i64()
            .and_then(|id| ratings.get(&id))
            .is_some_and(|row| {
                row["elo"] == update["expected_elo"]
                    && row["wins"] == update["expected_wins"]
                    && row["losses"] == update["expected_losses"]
            })
    });
    if !matches {
        return Json(false).into_response();
    }

    for update in &updates {
        if let Some(row) = update["race_id"].as_i64().and_then(|id| ratings.get_mut(&id)) {
            row["elo"] = update["elo"].clone();
            row["wins"] = update["wins"].clone();
            row["losses"] = update["losses"].clone();
        }
    }
    Json(true).into_response()
}

async fn insert_duel(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(row): Json<Value>,
) -> Response {
    if let Some(rejected) = gate(&state, &headers) {
        return rejected;
    }

    state.duels.lock().expect("duels lock").push(row);
    StatusCode::CREATED.into_response()
}

/// A `race_ratings` row as PostgREST would return it
pub fn rating_row(race_id: RaceId, elo: f64, wins: u32, losses: u32) -> Value {
    json!({
        "race_id": race_id,
        "season": SEASON,
        "round": race_id,
        "race_name": format!("Race {}", race_id),
        "wins": wins,
        "losses": losses,
        "elo": elo,
        "prior_score": 0.5,
        "logit_seed": 0.1,
        "updated_at": "2024-03-01T12:00:00+00:00"
    })
}
