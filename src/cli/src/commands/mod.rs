//! CLI subcommands.

pub mod experiments;
pub mod health;
pub mod save;
pub mod show;
pub mod simulate;
pub mod watch;

use std::sync::Arc;

use anyhow::{bail, Result};
use mindcraft_core::engine::AggregationEngine;
use mindcraft_core::events::{try_group_by_subject, Event, Instance, SubjectId};
use mindcraft_core::processors::{ProcessorLoader, ProcessorRegistry};
use mindcraft_core::state::{LiveStateStore, ViewUpdate};

use crate::client::ApiClient;

/// Fetch the catalog and every experiment's history into a local live store.
///
/// Experiments whose history cannot be fetched or fails validation stay unloaded.
pub async fn bootstrap(client: &ApiClient) -> Result<AggregationEngine> {
    let catalog = client.config().await?;

    let registry = ProcessorRegistry::new();
    ProcessorLoader::default().load(&catalog, &registry);

    let mut history = Vec::with_capacity(catalog.len());
    for entry in &catalog {
        let fetched = client
            .experiment(&entry.name)
            .await
            .and_then(|instances| checked_history(&entry.name, instances));
        match fetched {
            Ok(events) => history.push((entry.name.clone(), events)),
            Err(e) => {
                tracing::warn!(experiment = %entry.name, error = %e, "Failed to fetch history");
            }
        }
    }

    let live = Arc::new(LiveStateStore::new());
    live.initialize(catalog, history);
    Ok(AggregationEngine::new(live, registry))
}

/// Flatten server-grouped history, rejecting events from another experiment.
fn checked_history(experiment: &str, instances: Vec<Instance>) -> Result<Vec<Event>> {
    let events = instances.into_iter().flat_map(|i| i.data);
    let instances = try_group_by_subject(experiment, events)?;
    Ok(instances.into_iter().flat_map(|i| i.data).collect())
}

/// Open an experiment's detail view, optionally on one subject.
pub fn focus(store: &LiveStateStore, experiment: &str, subject: Option<&str>) -> Result<()> {
    let state = store.snapshot();
    if state.config_entry(experiment).is_none() {
        bail!("Unknown experiment '{}'", experiment);
    }
    if !state.is_loaded(experiment) {
        bail!("Experiment '{}' could not be loaded", experiment);
    }

    store.select_experiment(experiment);

    if let Some(raw) = subject {
        let subject: SubjectId = raw.parse()?;
        let index = state
            .instances(experiment)
            .and_then(|instances| instances.iter().position(|i| i.subject == subject))
            .ok_or_else(|| anyhow::anyhow!("No data for subject {} in {}", subject, experiment))?;
        store.set_view(ViewUpdate::new().instance_index(index));
    }

    Ok(())
}
