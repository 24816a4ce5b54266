//! Event store adapters.
//!
//! The store is the append-only source of truth for raw events. It assigns
//! `time` at persistence and answers per-experiment history queries in
//! insertion order.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::event::{now_millis, Event, NewEvent, SubjectId};
use crate::config::ConfigEntry;
use crate::error::{MindcraftError, Result};

/// Append-only event persistence.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Validate, timestamp and persist one event, returning the stored form.
    async fn save(&self, event: NewEvent) -> Result<Event>;

    /// Every event of one experiment, in insertion order.
    async fn query_by_experiment(&self, experiment: &str) -> Result<Vec<Event>>;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}

// =============================================================================
// In-memory store
// =============================================================================

/// Process-local store used for development and tests.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: RwLock<Vec<Event>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saved events.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn save(&self, event: NewEvent) -> Result<Event> {
        let event = event.into_event(now_millis())?;
        self.events.write().push(event.clone());
        debug!(
            experiment = %event.experiment,
            subject = %event.subject,
            event = %event.event,
            "Event stored in memory"
        );
        Ok(event)
    }

    async fn query_by_experiment(&self, experiment: &str) -> Result<Vec<Event>> {
        Ok(self
            .events
            .read()
            .iter()
            .filter(|e| e.experiment == experiment)
            .cloned()
            .collect())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

// =============================================================================
// PostgreSQL store
// =============================================================================

/// PostgreSQL-backed store using sqlx.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Connect a pool and apply migrations.
    pub async fn connect(url: &str, max_connections: u32, min_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(max_connections, "Connected to event database");
        Ok(store)
    }

    /// Run migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| MindcraftError::from(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    fn row_to_event(row: &sqlx::postgres::PgRow) -> Result<Event> {
        let subject: String = row.try_get("subject")?;
        Ok(Event {
            experiment: row.try_get("experiment")?,
            subject: subject.parse::<SubjectId>()?,
            event: row.try_get("event")?,
            args: row.try_get::<Option<Value>, _>("args")?,
            time: row.try_get("time")?,
        })
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    #[instrument(skip(self, event))]
    async fn save(&self, event: NewEvent) -> Result<Event> {
        let event = event.into_event(now_millis())?;

        sqlx::query(
            r#"
            INSERT INTO events (experiment, subject, event, args, time)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&event.experiment)
        .bind(event.subject.as_str())
        .bind(&event.event)
        .bind(&event.args)
        .bind(event.time)
        .execute(&self.pool)
        .await?;

        Ok(event)
    }

    #[instrument(skip(self))]
    async fn query_by_experiment(&self, experiment: &str) -> Result<Vec<Event>> {
        let rows = sqlx::query(
            r#"
            SELECT experiment, subject, event, args, time
            FROM events
            WHERE experiment = $1
            ORDER BY id
            "#,
        )
        .bind(experiment)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_event).collect()
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

// =============================================================================
// History bootstrap
// =============================================================================

/// Fetch the history of every configured experiment.
///
/// An experiment whose query fails is logged and left out, so it stays
/// "not loaded" instead of showing up empty.
pub async fn fetch_history(
    store: &dyn EventStore,
    entries: &[ConfigEntry],
) -> Vec<(String, Vec<Event>)> {
    let mut history = Vec::with_capacity(entries.len());
    for entry in entries {
        match store.query_by_experiment(&entry.name).await {
            Ok(events) => {
                debug!(experiment = %entry.name, events = events.len(), "History fetched");
                history.push((entry.name.clone(), events));
            }
            Err(e) => {
                warn!(experiment = %entry.name, error = %e, "Failed to fetch history");
            }
        }
    }
    history
}
