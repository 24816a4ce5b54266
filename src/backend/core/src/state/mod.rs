//! Live state.
//!
//! The single authoritative in-memory picture of every loaded experiment plus
//! the viewer's navigation focus. [`LiveStateStore`] owns it; everyone else
//! reads immutable [`LiveState`] snapshots.

pub mod store;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::ConfigEntry;
use crate::events::Instance;

pub use store::{ListenerId, LiveStateStore, MergeOutcome};

// ═══════════════════════════════════════════════════════════════════════════════
// View State
// ═══════════════════════════════════════════════════════════════════════════════

/// Which screen the viewer is on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Page {
    /// Startup, before history has been loaded.
    #[default]
    Loading,
    /// The experiment list.
    Experiments,
    /// One experiment's detail page.
    Detail,
}

/// Navigation focus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub page: Page,
    pub experiment: Option<String>,
    /// Index into the focused experiment's instances. Not validated on write.
    pub instance_index: usize,
}

/// Partial update of [`ViewState`]; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewUpdate {
    pub page: Option<Page>,
    pub experiment: Option<Option<String>>,
    pub instance_index: Option<usize>,
}

impl ViewUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    pub fn experiment(mut self, experiment: Option<String>) -> Self {
        self.experiment = Some(experiment);
        self
    }

    pub fn instance_index(mut self, index: usize) -> Self {
        self.instance_index = Some(index);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.page.is_none() && self.experiment.is_none() && self.instance_index.is_none()
    }

    pub(crate) fn apply(self, view: &mut ViewState) {
        if let Some(page) = self.page {
            view.page = page;
        }
        if let Some(experiment) = self.experiment {
            view.experiment = experiment;
        }
        if let Some(index) = self.instance_index {
            view.instance_index = index;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Live State
// ═══════════════════════════════════════════════════════════════════════════════

/// Snapshot of everything a viewer needs.
///
/// An experiment is "loaded" once it has a key in `experiments`, even when it
/// has no instances yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiveState {
    pub view: ViewState,
    pub config: Vec<ConfigEntry>,
    pub experiments: HashMap<String, Vec<Instance>>,
}

impl LiveState {
    pub fn instances(&self, experiment: &str) -> Option<&[Instance]> {
        self.experiments.get(experiment).map(Vec::as_slice)
    }

    pub fn is_loaded(&self, experiment: &str) -> bool {
        self.experiments.contains_key(experiment)
    }

    pub fn config_entry(&self, experiment: &str) -> Option<&ConfigEntry> {
        self.config.iter().find(|e| e.name == experiment)
    }

    /// Number of instances of a loaded experiment.
    pub fn participants(&self, experiment: &str) -> Option<usize> {
        self.experiments.get(experiment).map(Vec::len)
    }

    /// The focused experiment's instance, with the index clamped to the last one.
    ///
    /// `None` when no experiment is focused, it is not loaded, or it has no
    /// instances.
    pub fn selected_instance(&self) -> Option<&Instance> {
        let experiment = self.view.experiment.as_deref()?;
        let instances = self.experiments.get(experiment)?;
        let last = instances.len().checked_sub(1)?;
        instances.get(self.view.instance_index.min(last))
    }
}
