//! Mindcraft Server - Main entry point
//!
//! Persists experiment events, keeps a live dataset and pushes every saved
//! event to connected viewers.

use std::sync::Arc;

use mindcraft_core::{
    api::{self, AppState},
    config::{load_experiment_config, Config},
    events::{fetch_history, EventStore, MemoryEventStore, PgEventStore},
    processors::{ProcessorLoader, ProcessorRegistry},
    state::LiveStateStore,
    sync::SyncChannel,
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = match std::env::var("MINDCRAFT_CONFIG_FILE") {
        Ok(path) => Config::from_file(&path),
        Err(_) => Config::load(),
    }
    .unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config: {}. Using defaults.", e);
        Config::default()
    });

    // Initialize observability
    telemetry::init_logging(&config.logging)?;
    let metrics = telemetry::init_metrics("mindcraft-server")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Mindcraft Server"
    );

    // Event store
    let events: Arc<dyn EventStore> = match config.database.url.as_deref() {
        Some(url) => Arc::new(
            PgEventStore::connect(
                url,
                config.database.max_connections,
                config.database.min_connections,
            )
            .await?,
        ),
        None => {
            tracing::warn!("No database configured; events are kept in memory only");
            Arc::new(MemoryEventStore::new())
        }
    };

    // Experiment catalog is required
    let catalog = load_experiment_config(&config.experiments.config_path).await?;

    // Processors
    let registry = ProcessorRegistry::new();
    let report = ProcessorLoader::default().load(&catalog, &registry);
    for failure in &report.failed {
        tracing::warn!(
            experiment = %failure.experiment,
            reason = %failure.reason,
            "Experiment has no processor"
        );
    }

    // Live dataset
    let history = fetch_history(events.as_ref(), &catalog).await;
    let live = Arc::new(LiveStateStore::new());
    live.initialize(catalog.clone(), history);

    let sync = SyncChannel::new(config.experiments.sync_buffer);
    let app_state =
        AppState::new(events, live, registry, sync, catalog).with_metrics(metrics);
    let sync_task = app_state.start_sync();

    // Build router
    let app = api::build_router(app_state);

    // Start server
    let addr = config.bind_address();
    tracing::info!(address = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sync_task.abort();
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
