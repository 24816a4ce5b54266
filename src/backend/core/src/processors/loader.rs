//! Processor discovery.
//!
//! Experiment catalog entries name their processor through a `script`
//! reference such as `probmatch.js`. The [`ProcessorLoader`] resolves each
//! reference against a [`ProcessorCatalog`] of built-in processors and
//! registers the result under the entry's experiment name. Entries that
//! cannot be resolved are reported; their experiment simply has no
//! statistics.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::probmatch::ProbMatchProcessor;
use super::registry::ProcessorRegistry;
use super::Processor;
use crate::config::ConfigEntry;

/// Builds a fresh processor instance.
pub type ProcessorFactory = Arc<dyn Fn() -> Arc<dyn Processor> + Send + Sync>;

// ═══════════════════════════════════════════════════════════════════════════════
// Catalog
// ═══════════════════════════════════════════════════════════════════════════════

/// Script references known to this build.
///
/// Keys are normalized script stems: directory and extension are dropped and
/// the rest is lowercased, so `experiments/ProbMatch.js` and `probmatch` match.
#[derive(Clone, Default)]
pub struct ProcessorCatalog {
    factories: HashMap<String, ProcessorFactory>,
}

impl ProcessorCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog of processors that ship with Mindcraft.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.insert("probmatch", || {
            Arc::new(ProbMatchProcessor::new()) as Arc<dyn Processor>
        });
        catalog
    }

    pub fn insert<F>(&mut self, script: &str, factory: F)
    where
        F: Fn() -> Arc<dyn Processor> + Send + Sync + 'static,
    {
        self.factories.insert(script_key(script), Arc::new(factory));
    }

    /// Build the processor for a script reference, if the catalog knows it.
    pub fn build(&self, script: &str) -> Option<Arc<dyn Processor>> {
        self.factories.get(&script_key(script)).map(|factory| factory())
    }

    pub fn contains(&self, script: &str) -> bool {
        self.factories.contains_key(&script_key(script))
    }

    /// Normalized script keys, sorted.
    pub fn scripts(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.factories.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl fmt::Debug for ProcessorCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorCatalog")
            .field("scripts", &self.scripts())
            .finish()
    }
}

fn script_key(script: &str) -> String {
    let path = Path::new(script.trim());
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Loader
// ═══════════════════════════════════════════════════════════════════════════════

/// An entry whose processor could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadFailure {
    pub experiment: String,
    pub script: String,
    pub reason: String,
}

/// Outcome of one loading pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Experiments that now have a processor.
    pub loaded: Vec<String>,
    pub failed: Vec<LoadFailure>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Resolves catalog entries to processors and registers them.
#[derive(Debug, Clone)]
pub struct ProcessorLoader {
    catalog: ProcessorCatalog,
}

impl ProcessorLoader {
    pub fn new(catalog: ProcessorCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &ProcessorCatalog {
        &self.catalog
    }

    /// Load a processor for every entry. Never fails as a whole.
    pub fn load(&self, entries: &[ConfigEntry], registry: &ProcessorRegistry) -> LoadReport {
        let mut report = LoadReport::default();

        for entry in entries {
            match self.catalog.build(&entry.script) {
                Some(processor) => {
                    registry.register(entry.name.clone(), processor);
                    report.loaded.push(entry.name.clone());
                }
                None => {
                    warn!(
                        experiment = %entry.name,
                        script = %entry.script,
                        "Unknown processor script; experiment will have no statistics"
                    );
                    report.failed.push(LoadFailure {
                        experiment: entry.name.clone(),
                        script: entry.script.clone(),
                        reason: format!("no built-in processor for script '{}'", entry.script),
                    });
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "Processor loading finished"
        );
        report
    }
}

impl Default for ProcessorLoader {
    fn default() -> Self {
        Self::new(ProcessorCatalog::builtin())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
