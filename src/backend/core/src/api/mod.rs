//! HTTP API for Mindcraft Core.
//!
//! Thin axum adapter around the engine:
//!
//! - `POST /save`: persist an event and broadcast it as `newData`
//! - `GET /experiment?name=`: an experiment's history grouped into instances
//! - `GET /config`: the experiment catalog
//! - `GET /experiments`: catalog entries with participant counts
//! - `GET /stats?name=[&subject=]`: global or per-instance statistics
//! - `GET /ws`: push channel
//! - `GET /health`, `GET /metrics`

mod handlers;
mod websocket;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ConfigEntry;
use crate::engine::AggregationEngine;
use crate::events::EventStore;
use crate::processors::ProcessorRegistry;
use crate::state::LiveStateStore;
use crate::sync::{spawn_store_sync, SyncChannel};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub events: Arc<dyn EventStore>,
    pub engine: AggregationEngine,
    pub sync: SyncChannel,
    pub config: Arc<Vec<ConfigEntry>>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        events: Arc<dyn EventStore>,
        live: Arc<LiveStateStore>,
        registry: ProcessorRegistry,
        sync: SyncChannel,
        config: Vec<ConfigEntry>,
    ) -> Self {
        Self {
            events,
            engine: AggregationEngine::new(live, registry),
            sync,
            config: Arc::new(config),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn live(&self) -> &Arc<LiveStateStore> {
        self.engine.store()
    }

    /// Keep the server's own live store in step with saved events.
    pub fn start_sync(&self) -> JoinHandle<()> {
        spawn_store_sync(self.sync.subscribe(), Arc::clone(self.live()))
    }
}

/// Build the API router.
///
/// # Example
///
/// ```rust,ignore
/// let state = AppState::new(events, live, registry, sync, config);
/// let app = build_router(state);
/// ```
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::prometheus_metrics))
        .route("/ws", get(websocket::ws_handler))
        .route("/save", post(handlers::save_event))
        .route("/experiment", get(handlers::experiment_history))
        .route("/experiments", get(handlers::list_experiments))
        .route("/config", get(handlers::experiment_config))
        .route("/stats", get(handlers::experiment_stats))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// API response wrapper.
///
/// Failures are rendered by `MindcraftError`, whose body carries the same
/// `success` and `error` fields, so clients can decode either into this type.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_info: Option<crate::error::ErrorInfo>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_info: None,
        }
    }
}

pub use handlers::{HealthResponse, StatsQuery, StatsResponse};
