//! Integration tests for the race-duel service
//!
//! These tests drive the full HTTP API over the dataset files and an
//! in-memory rating store:
//! - Seed-only mode (no store configured)
//! - Vote flow and leaderboard
//! - Degraded store reads
//! - A real server bound to a local port

mod fixtures;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use race_duel::rating::{FailureMode, RatingStore};
use race_duel::service::{create_router, HttpServer};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use fixtures::{app_state, seeded_store, TestDataDir};

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn vote(winner: i64, loser: i64) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/duel")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "winnerRaceId": winner, "loserRaceId": loser }).to_string(),
        ))
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_seed_only_mode_serves_duels_and_rejects_votes() {
    let data = TestDataDir::new();
    let seeds_before = data.read_seeds();
    let app = create_router(app_state(&data, None));

    for _ in 0..10 {
        let response = app.clone().oneshot(get("/duel")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let a = body["raceA"]["raceId"].as_i64().unwrap();
        let b = body["raceB"]["raceId"].as_i64().unwrap();
        assert_ne!(a, b);
        assert!((1..=4).contains(&a) && (1..=4).contains(&b));

        // Seed elo is served while no store exists
        let expected_elo = fixtures::fixture_races()
            .into_iter()
            .find(|race| race.race_id == a)
            .map(|race| race.elo_seed)
            .unwrap();
        assert_eq!(body["raceA"]["elo"].as_f64().unwrap(), expected_elo);
    }

    let response = app.clone().oneshot(vote(1, 2)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert!(json_body(response).await["error"].is_string());

    assert_eq!(data.read_seeds(), seeds_before);
}

#[tokio::test]
async fn test_duel_payload_carries_summary_fields() {
    let data = TestDataDir::new();
    let app = create_router(app_state(&data, None));

    let body = json_body(app.oneshot(get("/duel")).await.unwrap()).await;
    let race = &body["raceA"];
    let round = race["round"].as_i64().unwrap();

    assert_eq!(race["season"], 2023);
    assert_eq!(race["summaryText"], "A race, with commas");
    assert_eq!(
        race["youtubeHighlightsUrl"],
        format!("https://youtube.example/{}", round)
    );
    assert_eq!(race["uniqueStrategyShare"], 0.25);
    assert_eq!(race["avgStopsPerDriver"], 1.8);
    assert_eq!(race["dnfCount"], round);
    assert_eq!(race["maxRegretSeconds"], 4.5);
    assert_eq!(race["topMover"], format!("Driver {}", round));
    assert_eq!(race["topMoverGain"].as_f64().unwrap(), round as f64);
}

#[tokio::test]
async fn test_vote_flow_updates_ratings_and_leaderboard() {
    let data = TestDataDir::new();
    let store = seeded_store();
    let live: Arc<dyn RatingStore> = store.clone();
    let app = create_router(app_state(&data, Some(live)));

    // Race 4 (1450) beats race 3 (1550) twice
    for _ in 0..2 {
        let response = app.clone().oneshot(vote(4, 3)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "success": true }));
    }

    let winner = store.record(4).unwrap();
    let loser = store.record(3).unwrap();
    assert_eq!((winner.wins, winner.losses), (2, 0));
    assert_eq!((loser.wins, loser.losses), (0, 2));
    assert!(winner.elo > 1450.0);
    assert!(loser.elo < 1550.0);
    assert_eq!(winner.elo, winner.elo.round());
    assert_eq!(winner.elo - 1450.0, 1550.0 - loser.elo);

    let outcomes = store.outcomes();
    assert_eq!(outcomes.len(), 2);
    assert!((outcomes[0].winner_expected - 0.3599).abs() < 1e-3);

    // Duels now show the live rating
    let response = app.clone().oneshot(get("/ratings")).await.unwrap();
    let board = json_body(response).await;
    let entries = board.as_array().unwrap();
    assert_eq!(entries.len(), 4);
    let elos: Vec<f64> = entries.iter().map(|e| e["elo"].as_f64().unwrap()).collect();
    assert!(elos.windows(2).all(|w| w[0] >= w[1]));
    let race_four = entries.iter().find(|e| e["raceId"] == 4).unwrap();
    assert_eq!(race_four["wins"], 2);
}

#[tokio::test]
async fn test_unknown_race_is_rejected_without_writes() {
    let data = TestDataDir::new();
    let store = seeded_store();
    let live: Arc<dyn RatingStore> = store.clone();
    let app = create_router(app_state(&data, Some(live)));

    let response = app.clone().oneshot(vote(1, 999)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = json_body(response).await["error"].as_str().unwrap().to_string();
    assert!(error.contains("999"));

    assert_eq!(store.write_calls(), 0);
    assert_eq!(store.record(1).unwrap().elo, 1520.0);
}

#[tokio::test]
async fn test_degraded_store_reads_fall_back_and_writes_fail() {
    let data = TestDataDir::new();
    let store = seeded_store();
    let live: Arc<dyn RatingStore> = store.clone();
    let state = app_state(&data, Some(live));
    let app = create_router(state.clone());

    store.set_failure_mode(FailureMode {
        fail_reads: true,
        fail_writes: true,
        fail_outcomes: false,
    });

    let response = app.clone().oneshot(get("/duel")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(vote(1, 2)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let fallbacks = state
        .metrics()
        .store()
        .rating_fallbacks_total
        .with_label_values(&["error"])
        .get();
    assert_eq!(fallbacks, 1);

    // Recovery needs no restart
    store.set_failure_mode(FailureMode::default());
    let response = app.oneshot(vote(1, 2)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_fewer_than_two_races_is_server_error() {
    let data = TestDataDir::with_files(
        &format!(
            "{}\n2023,1,Bahrain Grand Prix,,,0,0,0,0,,\n",
            fixtures::SUMMARY_HEADER
        ),
        &format!("{}\n", fixtures::SEED_HEADER),
    );
    let app = create_router(app_state(&data, None));

    let response = app.oneshot(get("/duel")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(response).await["error"]
        .as_str()
        .unwrap()
        .contains("Not enough races"));
}

#[tokio::test]
async fn test_malformed_summaries_report_rows() {
    let data = TestDataDir::with_files(
        &format!(
            "{}\n2023,1,Bahrain Grand Prix,,,0,0,0,0,,\n2023,2,too,few\n",
            fixtures::SUMMARY_HEADER
        ),
        &format!("{}\n", fixtures::SEED_HEADER),
    );
    let app = create_router(app_state(&data, None));

    let response = app.oneshot(get("/duel")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error = json_body(response).await["error"].as_str().unwrap().to_string();
    assert!(error.contains("race_summaries.csv"));
    assert!(error.contains("line 3"));
}

#[tokio::test]
async fn test_leaderboard_orderings() {
    // (share, dnf, regret, elo) per round; ids come from the seed index
    let races = [
        (0.1, 3, 9.0, 1500.0),
        (0.6, 0, 1.0, 1510.0),
        (0.3, 5, 7.0, 1490.0),
        (0.5, 1, 3.0, 1530.0),
        (0.2, 4, 8.0, 1480.0),
        (0.4, 2, 2.0, 1520.0),
    ];
    let mut summaries = format!("{}\n", fixtures::SUMMARY_HEADER);
    let mut seeds = format!("{}\n", fixtures::SEED_HEADER);
    for (i, (share, dnf, regret, elo)) in races.iter().enumerate() {
        let round = i + 1;
        summaries.push_str(&format!(
            "2023,{},Race {},,,{},1.5,{},{},,\n",
            round, round, share, dnf, regret
        ));
        seeds.push_str(&format!(
            "{},2023,{},Race {},0.5,{},0.1\n",
            round, round, round, elo
        ));
    }
    let data = TestDataDir::with_files(&summaries, &seeds);
    let app = create_router(app_state(&data, None));

    let cases: [(&str, Vec<i64>); 5] = [
        ("/ratings", vec![4, 6, 2, 1, 3, 5]),
        ("/ratings?by=elo&limit=2", vec![4, 6]),
        ("/ratings?by=unique_strategy", vec![2, 4, 6, 3, 5, 1]),
        ("/ratings?by=max_regret", vec![1, 5, 3, 4, 6, 2]),
        ("/ratings?by=dnf", vec![3, 5, 1, 6, 4]),
    ];
    for (uri, expected) in cases {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "uri {}", uri);
        let body = json_body(response).await;
        let ids: Vec<i64> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["raceId"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, expected, "uri {}", uri);
    }

    let response = app.oneshot(get("/ratings?limit=abc")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn test_server_over_tcp() {
    let data = TestDataDir::new();
    let live: Arc<dyn RatingStore> = seeded_store();
    let server = Arc::new(HttpServer::new(app_state(&data, Some(live))));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = {
        let server = server.clone();
        tokio::spawn(async move { server.serve(listener).await })
    };

    let client = reqwest::Client::new();
    let duel: Value = client
        .get(format!("http://{}/duel", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let winner = duel["raceA"]["raceId"].as_i64().unwrap();
    let loser = duel["raceB"]["raceId"].as_i64().unwrap();

    let response = client
        .post(format!("http://{}/duel", addr))
        .json(&json!({ "winnerRaceId": winner, "loserRaceId": loser }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let health: Value = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["stats"]["races_loaded"], 4);

    server.stop();
    handle.await.unwrap().unwrap();
}
