//! Prometheus metrics.
//!
//! Counters are recorded with the `metrics` facade throughout the crate; this
//! module names them, describes them and installs the Prometheus recorder
//! whose handle backs the `/metrics` endpoint.

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Errors constructed, labelled by code, category and severity.
pub const ERRORS_TOTAL: &str = "mindcraft_errors_total";
/// Events persisted through the event store.
pub const EVENTS_SAVED_TOTAL: &str = "mindcraft_events_saved_total";
/// Pushed events folded into a live state store.
pub const EVENTS_MERGED_TOTAL: &str = "mindcraft_events_merged_total";
/// Pushed events dropped because their experiment was not loaded.
pub const EVENTS_DROPPED_TOTAL: &str = "mindcraft_events_dropped_total";
/// Messages published on the sync channel.
pub const SYNC_PUBLISHED_TOTAL: &str = "mindcraft_sync_published_total";

/// Install the Prometheus recorder and register metric descriptions.
///
/// # Errors
///
/// Returns an error if a global recorder is already installed.
pub fn init_metrics(service_name: &str) -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .add_global_label("service", service_name)
        .install_recorder()?;

    register_metric_descriptions();

    tracing::info!(service_name = %service_name, "Metrics initialized");
    Ok(handle)
}

fn register_metric_descriptions() {
    describe_counter!(ERRORS_TOTAL, "Total number of errors by code");
    describe_counter!(EVENTS_SAVED_TOTAL, "Total events persisted");
    describe_counter!(EVENTS_MERGED_TOTAL, "Total pushed events merged into live state");
    describe_counter!(
        EVENTS_DROPPED_TOTAL,
        "Total pushed events dropped for unloaded experiments"
    );
    describe_counter!(SYNC_PUBLISHED_TOTAL, "Total sync messages published");
}

/// Record one persisted event.
pub fn record_event_saved(experiment: &str) {
    counter!(EVENTS_SAVED_TOTAL, "experiment" => experiment.to_string()).increment(1);
}
