//! # Statistics Processors
//!
//! Experiment-specific computations that turn events into statistics without
//! the engine knowing anything about the experiment.
//!
//! ## Architecture
//!
//! - **Processor trait**: pure `global_stats` / `instance_stats` over events.
//! - **Registry**: experiment name -> processor, injected where needed.
//! - **Loader**: resolves each catalog entry's `script` against the built-in
//!   [`ProcessorCatalog`] and registers the result.
//! - **ProbMatch**: the bundled probability-matching processor.

pub mod loader;
pub mod probmatch;
pub mod registry;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::events::{Event, Instance};

// ═══════════════════════════════════════════════════════════════════════════════
// Processor Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// The interface every statistics processor implements.
///
/// Implementations must be pure: the same input always yields the same rows,
/// in the same order.
pub trait Processor: Send + Sync + fmt::Debug {
    /// Statistics across every instance of an experiment.
    fn global_stats(&self, instances: &[Instance]) -> Vec<StatPair>;

    /// Statistics for one instance. Events arrive sorted by `time`.
    fn instance_stats(&self, events: &[Event]) -> Vec<StatPair>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Statistic Rows
// ═══════════════════════════════════════════════════════════════════════════════

/// Value of one statistic row. Serialized as a bare JSON number or string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for StatValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<usize> for StatValue {
    fn from(value: usize) -> Self {
        Self::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for StatValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<String> for StatValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for StatValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// A named statistic row. Row order is defined by the processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatPair {
    pub name: String,
    pub value: StatValue,
}

impl StatPair {
    pub fn new(name: impl Into<String>, value: impl Into<StatValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Re-exports for convenience
// ═══════════════════════════════════════════════════════════════════════════════

pub use loader::{LoadFailure, LoadReport, ProcessorCatalog, ProcessorFactory, ProcessorLoader};
pub use probmatch::ProbMatchProcessor;
pub use registry::{ProcessorRegistry, RegistryError};
