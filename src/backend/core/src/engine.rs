//! Aggregation engine.
//!
//! Turns the live dataset into statistics on demand. Nothing is cached: every
//! call reads the current snapshot and asks the experiment's processor again.
//! "Not ready" (experiment not loaded, or no processor) is `None`, not an
//! error.

use std::sync::Arc;

use tracing::debug;

use crate::events::{sort_by_time, Event, Instance};
use crate::processors::{Processor, ProcessorRegistry, StatPair};
use crate::state::{LiveState, LiveStateStore};

/// Computes statistics from a [`LiveStateStore`] with an injected registry.
#[derive(Clone)]
pub struct AggregationEngine {
    store: Arc<LiveStateStore>,
    registry: ProcessorRegistry,
}

impl AggregationEngine {
    pub fn new(store: Arc<LiveStateStore>, registry: ProcessorRegistry) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &Arc<LiveStateStore> {
        &self.store
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    /// Statistics across all instances of an experiment.
    pub fn compute_global(&self, experiment: &str) -> Option<Vec<StatPair>> {
        let state = self.store.snapshot();
        self.global_from(&state, experiment)
    }

    /// Statistics for one instance's events, processed in time order.
    ///
    /// The experiment must be loaded; `events` is not modified.
    pub fn compute_instance(&self, experiment: &str, events: &[Event]) -> Option<Vec<StatPair>> {
        let state = self.store.snapshot();
        self.instance_from(&state, experiment, events)
    }

    /// Instance statistics for the snapshot's focused instance.
    pub fn compute_selected_instance(&self) -> Option<(Instance, Vec<StatPair>)> {
        let state = self.store.snapshot();
        let experiment = state.view.experiment.as_deref()?;
        let instance = state.selected_instance()?;
        let rows = self.instance_from(&state, experiment, &instance.data)?;
        Some((instance.clone(), rows))
    }

    /// Number of instances of a loaded experiment.
    pub fn participants(&self, experiment: &str) -> Option<usize> {
        self.store.snapshot().participants(experiment)
    }

    /// Global statistics computed against a snapshot the caller already holds.
    pub fn global_from(&self, state: &LiveState, experiment: &str) -> Option<Vec<StatPair>> {
        let Some(instances) = state.instances(experiment) else {
            debug!(experiment = %experiment, "Global stats pending: experiment not loaded");
            return None;
        };
        let processor = self.processor(experiment)?;

        let rows = processor.global_stats(instances);
        debug!(
            experiment = %experiment,
            instances = instances.len(),
            rows = rows.len(),
            "Global stats computed"
        );
        Some(rows)
    }

    /// Instance statistics checked against a snapshot the caller already holds.
    pub fn instance_from(
        &self,
        state: &LiveState,
        experiment: &str,
        events: &[Event],
    ) -> Option<Vec<StatPair>> {
        if !state.is_loaded(experiment) {
            debug!(experiment = %experiment, "Instance stats pending: experiment not loaded");
            return None;
        }
        let processor = self.processor(experiment)?;

        let sorted = sort_by_time(events);
        let rows = processor.instance_stats(&sorted);
        debug!(
            experiment = %experiment,
            events = sorted.len(),
            rows = rows.len(),
            "Instance stats computed"
        );
        Some(rows)
    }

    fn processor(&self, experiment: &str) -> Option<Arc<dyn Processor>> {
        self.registry.resolve(experiment).ok()
    }
}

impl std::fmt::Debug for AggregationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationEngine")
            .field("processors", &self.registry.names())
            .finish()
    }
}
