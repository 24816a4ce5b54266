//! Display models.
//!
//! Pure functions from a [`LiveState`] snapshot to what a viewer shows: the
//! experiment list and an experiment's detail page. Renderers (the CLI, the
//! HTTP API) only format these.

use serde::{Deserialize, Serialize};

use crate::engine::AggregationEngine;
use crate::events::{sorted_by_subject, Event, SubjectId};
use crate::processors::StatPair;
use crate::state::LiveState;

/// Placeholder shown where an instance would be.
pub const NO_DATA: &str = "no data yet...";

/// Shown for events without arguments.
pub const NO_ARGUMENTS: &str = "no arguments";

// ═══════════════════════════════════════════════════════════════════════════════
// Experiment List
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentListing {
    pub name: String,
    pub long_name: String,
    pub description: String,
    /// `None` while the experiment's history is not loaded.
    pub participants: Option<usize>,
}

impl ExperimentListing {
    pub fn participants_label(&self) -> String {
        match self.participants {
            Some(1) => "1 participant".to_string(),
            Some(n) => format!("{} participants", n),
            None => "not loaded".to_string(),
        }
    }
}

/// One row per configured experiment, in catalog order.
pub fn experiment_listings(state: &LiveState) -> Vec<ExperimentListing> {
    state
        .config
        .iter()
        .map(|entry| ExperimentListing {
            name: entry.name.clone(),
            long_name: entry.long_name.clone(),
            description: entry.description.clone(),
            participants: state.participants(&entry.name),
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Detail Page
// ═══════════════════════════════════════════════════════════════════════════════

/// An entry of the subject picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectOption {
    pub subject: SubjectId,
    /// Position in the experiment's canonical instance order.
    pub index: usize,
    pub selected: bool,
}

/// One line of the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRow {
    pub time: i64,
    pub event: String,
    pub args: String,
}

impl From<&Event> for EventRow {
    fn from(event: &Event) -> Self {
        Self {
            time: event.time,
            event: event.event.clone(),
            args: match &event.args {
                Some(args) => args.to_string(),
                None => NO_ARGUMENTS.to_string(),
            },
        }
    }
}

/// The focused instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstancePanel {
    pub subject: SubjectId,
    pub index: usize,
    pub total: usize,
    pub complete: bool,
    /// `None` while the experiment has no processor.
    pub stats: Option<Vec<StatPair>>,
    /// Time-sorted.
    pub events: Vec<EventRow>,
    pub has_previous: bool,
    pub has_next: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailPage {
    pub name: String,
    pub long_name: String,
    pub description: String,
    pub participants: usize,
    /// `None` while the experiment has no processor.
    pub global_stats: Option<Vec<StatPair>>,
    /// Ordered by subject.
    pub subjects: Vec<SubjectOption>,
    /// `None` when the experiment has no instances yet.
    pub instance: Option<InstancePanel>,
}

/// Build the detail page for the snapshot's focused experiment.
///
/// `None` unless an experiment is focused and loaded.
pub fn detail_page(engine: &AggregationEngine, state: &LiveState) -> Option<DetailPage> {
    let name = state.view.experiment.as_deref()?;
    let instances = state.instances(name)?;
    let entry = state.config_entry(name);

    let selected = state.selected_instance();
    let selected_index = selected.map(|_| state.view.instance_index.min(instances.len() - 1));

    let subjects = sorted_by_subject(instances)
        .into_iter()
        .map(|instance| {
            let index = instances
                .iter()
                .position(|i| i.subject == instance.subject)
                .unwrap_or_default();
            SubjectOption {
                subject: instance.subject.clone(),
                index,
                selected: Some(index) == selected_index,
            }
        })
        .collect();

    let instance = match (selected, selected_index) {
        (Some(instance), Some(index)) => Some(InstancePanel {
            subject: instance.subject.clone(),
            index,
            total: instances.len(),
            complete: instance.is_complete(),
            stats: engine.instance_from(state, name, &instance.data),
            events: instance.sorted_by_time().iter().map(EventRow::from).collect(),
            has_previous: index > 0,
            has_next: index + 1 < instances.len(),
        }),
        _ => None,
    };

    Some(DetailPage {
        name: name.to_string(),
        long_name: entry.map(|e| e.long_name.clone()).unwrap_or_else(|| name.to_string()),
        description: entry.map(|e| e.description.clone()).unwrap_or_default(),
        participants: instances.len(),
        global_stats: engine.global_from(state, name),
        subjects,
        instance,
    })
}
