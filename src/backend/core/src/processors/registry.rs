//! Processor registration and lookup.
//!
//! The [`ProcessorRegistry`] maps experiment names to processors. It is an
//! explicit value handed to whoever computes statistics; there is no global
//! registry. Registration never fails and the last registration for a name
//! wins.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::Processor;

// ═══════════════════════════════════════════════════════════════════════════════
// Registry Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Callers treat this as "statistics pending", not as a failure.
    #[error("No processor registered for experiment: {0}")]
    NotFound(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// Processor Registry
// ═══════════════════════════════════════════════════════════════════════════════

/// Registry of statistics processors keyed by experiment name.
///
/// Cheap to clone; clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct ProcessorRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<dyn Processor>>>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `processor` for `name`, returning the processor it replaced.
    pub fn register(
        &self,
        name: impl Into<String>,
        processor: Arc<dyn Processor>,
    ) -> Option<Arc<dyn Processor>> {
        let name = name.into();
        let previous = self.inner.write().insert(name.clone(), processor);

        if previous.is_some() {
            warn!(experiment = %name, "Processor replaced by a later registration");
        } else {
            info!(experiment = %name, "Processor registered");
        }
        previous
    }

    /// Look up the processor for an experiment.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Processor>, RegistryError> {
        match self.inner.read().get(name) {
            Some(processor) => Ok(Arc::clone(processor)),
            None => {
                debug!(experiment = %name, "No processor registered");
                Err(RegistryError::NotFound(name.to_string()))
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().contains_key(name)
    }

    /// Registered experiment names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
