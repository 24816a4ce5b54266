//! API request handlers with proper error propagation.
//!
//! Handlers return `Result<impl IntoResponse, MindcraftError>` so that errors
//! are converted to the right HTTP status by `MindcraftError`'s
//! `IntoResponse` implementation.

use axum::{
    body::Bytes,
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiResponse, AppState};
use crate::error::{ErrorContext, MindcraftError, Result};
use crate::events::{group_by_subject, NewEvent, SubjectId};
use crate::processors::StatPair;
use crate::telemetry::record_event_saved;
use crate::view::experiment_listings;

// ═══════════════════════════════════════════════════════════════════════════════
// Health Check
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub store: String,
    pub experiments_loaded: usize,
    pub processors: Vec<String>,
    pub sync_subscribers: usize,
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.live().snapshot();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        store: state.events.backend().to_string(),
        experiments_loaded: snapshot.experiments.len(),
        processors: state.engine.registry().names(),
        sync_subscribers: state.sync.subscriber_count(),
    })
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();

    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Events
// ═══════════════════════════════════════════════════════════════════════════════

/// Persist one event, then broadcast it.
///
/// The body is decoded by hand so that malformed JSON is an `InvalidEvent`
/// (422) like any other shape problem. Nothing is stored or broadcast on error.
pub async fn save_event(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let new_event = NewEvent::from_slice(&body)?;
    let event = state.events.save(new_event).await?;

    record_event_saved(&event.experiment);
    let subscribers = state.sync.publish(event.clone());

    info!(
        experiment = %event.experiment,
        subject = %event.subject,
        event = %event.event,
        subscribers,
        "Event saved"
    );

    Ok(Json(ApiResponse::success(event)))
}

#[derive(Debug, Deserialize)]
pub struct ExperimentQuery {
    pub name: String,
}

/// History of one experiment, grouped into instances. Unknown names yield `[]`.
pub async fn experiment_history(
    State(state): State<AppState>,
    Query(query): Query<ExperimentQuery>,
) -> Result<impl IntoResponse> {
    let events = state.events.query_by_experiment(&query.name).await?;
    Ok(Json(group_by_subject(events)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Catalog
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn experiment_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.config.as_ref().clone())
}

pub async fn list_experiments(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.live().snapshot();
    Json(ApiResponse::success(experiment_listings(&snapshot)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Statistics
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub name: String,
    pub subject: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub experiment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<SubjectId>,
    pub participants: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complete: Option<bool>,
    pub stats: Vec<StatPair>,
}

/// Statistics computed from the server's own live store.
pub async fn experiment_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<impl IntoResponse> {
    let snapshot = state.live().snapshot();
    let Some(instances) = snapshot.instances(&query.name) else {
        return Err(MindcraftError::experiment_not_loaded(&query.name));
    };
    let participants = instances.len();

    let response = match query.subject {
        None => {
            let stats = state
                .engine
                .global_from(&snapshot, &query.name)
                .ok_or_else(|| MindcraftError::processor_not_found(&query.name))?;
            StatsResponse {
                experiment: query.name,
                subject: None,
                participants,
                complete: None,
                stats,
            }
        }
        Some(raw) => {
            let subject: SubjectId = raw.parse()?;
            let instance = instances
                .iter()
                .find(|i| i.subject == subject)
                .context(format!("No data for subject {} in {}", subject, query.name))?;
            let stats = state
                .engine
                .instance_from(&snapshot, &query.name, &instance.data)
                .ok_or_else(|| MindcraftError::processor_not_found(&query.name))?;
            StatsResponse {
                experiment: query.name,
                subject: Some(subject),
                participants,
                complete: Some(instance.is_complete()),
                stats,
            }
        }
    };

    Ok(Json(ApiResponse::success(response)))
}
