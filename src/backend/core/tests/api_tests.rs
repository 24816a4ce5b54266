//! HTTP API tests.
//!
//! Tests cover:
//! - Health and metrics endpoints
//! - Saving events: validation, persistence and broadcast
//! - History and catalog endpoints
//! - Statistics over the server's live store

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use mindcraft_core::api::{build_router, ApiResponse, AppState, HealthResponse, StatsResponse};
use mindcraft_core::config::ConfigEntry;
use mindcraft_core::error::ErrorCode;
use mindcraft_core::events::{Event, Instance, MemoryEventStore};
use mindcraft_core::processors::{ProcessorLoader, ProcessorRegistry, StatValue};
use mindcraft_core::state::LiveStateStore;
use mindcraft_core::sync::SyncChannel;
use mindcraft_core::view::ExperimentListing;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tower::ServiceExt;

// ============================================================================
// Helpers
// ============================================================================

fn catalog() -> Vec<ConfigEntry> {
    vec![
        ConfigEntry {
            name: "ProbMatch".into(),
            long_name: "Probability Matching".into(),
            description: "Left or right".into(),
            script: "experiments/probmatch.js".into(),
        },
        ConfigEntry {
            name: "Stroop".into(),
            long_name: "Stroop Task".into(),
            description: String::new(),
            script: "experiments/stroop.js".into(),
        },
    ]
}

struct TestServer {
    state: AppState,
    events: Arc<MemoryEventStore>,
}

impl TestServer {
    fn new(history: Vec<(String, Vec<Event>)>) -> Self {
        let events = Arc::new(MemoryEventStore::new());
        let registry = ProcessorRegistry::new();
        ProcessorLoader::default().load(&catalog(), &registry);

        let live = Arc::new(LiveStateStore::new());
        live.initialize(catalog(), history);

        let state = AppState::new(
            events.clone(),
            live,
            registry,
            SyncChannel::new(16),
            catalog(),
        );
        Self { state, events }
    }

    fn loaded() -> Self {
        Self::new(vec![("ProbMatch".into(), Vec::new())])
    }

    fn router(&self) -> Router {
        build_router(self.state.clone())
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get<T: DeserializeOwned>(app: Router, uri: &str) -> (StatusCode, T) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_save(app: Router, body: impl Into<Body>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/save")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn wait_for_participants(live: &LiveStateStore, experiment: &str, expected: usize) {
    for _ in 0..100 {
        if live.snapshot().participants(experiment) == Some(expected) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("live store never reached {} participants", expected);
}

// ============================================================================
// Health & Metrics
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::loaded();
    let (status, health): (_, HealthResponse) = get(server.router(), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health.status, "healthy");
    assert_eq!(health.store, "memory");
    assert_eq!(health.experiments_loaded, 1);
    assert_eq!(health.processors, vec!["ProbMatch".to_string()]);
}

#[tokio::test]
async fn test_metrics_without_recorder_is_empty_text() {
    let server = TestServer::loaded();
    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = server.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

// ============================================================================
// Save
// ============================================================================

#[tokio::test]
async fn test_save_persists_and_broadcasts() {
    let server = TestServer::loaded();
    let mut subscriber = server.state.sync.subscribe();

    let body = json!({
        "experiment": "ProbMatch",
        "subject": 42,
        "event": "ButtonPress",
        "args": {"left": true}
    });
    let (status, response) = post_save(server.router(), body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], true);
    assert_eq!(response["data"]["subject"], 42);
    assert!(response["data"]["time"].as_i64().unwrap() > 0);
    assert_eq!(server.events.len(), 1);

    let message = subscriber.recv().await.unwrap();
    let pushed = message.event();
    assert_eq!(pushed.subject.as_integer(), Some(42));
    assert_eq!(pushed.arg("left"), Some(&json!(true)));
}

#[tokio::test]
async fn test_save_rejects_malformed_json() {
    let server = TestServer::loaded();
    let (status, response) = post_save(server.router(), "{not json").await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response["success"], false);
    assert!(server.events.is_empty());
    assert_eq!(server.state.sync.stats().published, 0);
}

#[tokio::test]
async fn test_save_rejects_missing_fields() {
    let server = TestServer::loaded();
    let body = json!({"experiment": "ProbMatch", "event": "Start"});
    let (status, response) = post_save(server.router(), body.to_string()).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response["error_info"]["code"], json!(ErrorCode::InvalidEvent));
    assert!(server.events.is_empty());
}

// ============================================================================
// History & Catalog
// ============================================================================

#[tokio::test]
async fn test_experiment_history_is_grouped() {
    let server = TestServer::loaded();
    for (subject, event) in [(1, "Start"), (2, "Start"), (1, "End")] {
        let body = json!({"experiment": "ProbMatch", "subject": subject, "event": event});
        post_save(server.router(), body.to_string()).await;
    }

    let (status, instances): (_, Vec<Instance>) =
        get(server.router(), "/experiment?name=ProbMatch").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(instances.len(), 2);
    assert_eq!(instances[0].subject.as_integer(), Some(1));
    assert_eq!(instances[0].data.len(), 2);
    assert!(instances[0].is_complete());

    let (_, unknown): (_, Vec<Instance>) = get(server.router(), "/experiment?name=Nope").await;
    assert!(unknown.is_empty());
}

#[tokio::test]
async fn test_config_lists_catalog() {
    let server = TestServer::loaded();
    let (status, entries): (_, Vec<Value>) = get(server.router(), "/config").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["longName"], "Probability Matching");
}

#[tokio::test]
async fn test_experiments_listing() {
    let server = TestServer::new(vec![(
        "ProbMatch".into(),
        vec![Event::new("ProbMatch", 1, "Start", 1)],
    )]);
    let (_, response): (_, ApiResponse<Vec<ExperimentListing>>) =
        get(server.router(), "/experiments").await;

    let listings = response.data.unwrap();
    assert_eq!(listings[0].participants_label(), "1 participant");
    assert_eq!(listings[1].participants_label(), "not loaded");
}

// ============================================================================
// Statistics
// ============================================================================

#[tokio::test]
async fn test_stats_follow_saved_events() {
    let server = TestServer::loaded();
    let sync = server.state.start_sync();

    for (subject, left) in [(1, true), (2, false), (2, true)] {
        let body = json!({
            "experiment": "ProbMatch",
            "subject": subject,
            "event": "ButtonPress",
            "args": {"left": left}
        });
        post_save(server.router(), body.to_string()).await;
    }
    wait_for_participants(server.state.live(), "ProbMatch", 2).await;
    // The second press for subject 2 may still be in flight.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (status, response): (_, ApiResponse<StatsResponse>) =
        get(server.router(), "/stats?name=ProbMatch").await;
    assert_eq!(status, StatusCode::OK);
    let stats = response.data.unwrap();
    assert_eq!(stats.participants, 2);
    assert_eq!(stats.stats[0].value, StatValue::Integer(3));

    let (_, response): (_, ApiResponse<StatsResponse>) =
        get(server.router(), "/stats?name=ProbMatch&subject=2").await;
    let stats = response.data.unwrap();
    assert_eq!(stats.complete, Some(false));
    assert_eq!(stats.stats[1].value, StatValue::from("50%"));

    sync.abort();
}

#[tokio::test]
async fn test_stats_for_unloaded_experiment() {
    let server = TestServer::new(Vec::new());
    let (status, response): (_, Value) = get(server.router(), "/stats?name=ProbMatch").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["error_info"]["code"], json!(ErrorCode::ExperimentNotLoaded));
}

#[tokio::test]
async fn test_stats_without_processor() {
    let server = TestServer::new(vec![("Stroop".into(), Vec::new())]);
    let (status, response): (_, Value) = get(server.router(), "/stats?name=Stroop").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["error_info"]["code"], json!(ErrorCode::ProcessorNotFound));
}

#[tokio::test]
async fn test_stats_for_unknown_subject() {
    let server = TestServer::new(vec![(
        "ProbMatch".into(),
        vec![Event::new("ProbMatch", 1, "Start", 1)],
    )]);
    let (status, response): (_, Value) =
        get(server.router(), "/stats?name=ProbMatch&subject=9").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["error_info"]["code"], json!(ErrorCode::ExperimentNotFound));
    assert_eq!(response["error"], json!("No data for subject 9 in ProbMatch"));
}
