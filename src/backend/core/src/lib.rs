#![allow(clippy::result_large_err)]
//! # Mindcraft Core
//!
//! Live aggregation and statistics engine for behavioral experiment events.
//!
//! ## Architecture
//!
//! - **Events**: the event model, per-subject instances and the append-only store
//! - **Processors**: per-experiment statistics plug-ins, loaded from the catalog
//! - **State**: the live state store with its view and change notifications
//! - **Engine**: on-demand global and per-instance statistics
//! - **Sync**: broadcast of saved events to every live viewer
//! - **View**: display models for the experiment list and detail page
//! - **API**: the HTTP and WebSocket surface
//! - **Telemetry**: structured logging and Prometheus metrics

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod processors;
pub mod state;
pub mod sync;
pub mod telemetry;
pub mod view;

pub use error::{ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, MindcraftError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, ConfigEntry};
    pub use crate::engine::AggregationEngine;
    pub use crate::error::{
        ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, MindcraftError, Result,
    };
    pub use crate::events::{Event, EventStore, Instance, MemoryEventStore, NewEvent, SubjectId};
    pub use crate::processors::{
        Processor, ProcessorLoader, ProcessorRegistry, StatPair, StatValue,
    };
    pub use crate::state::{LiveState, LiveStateStore, MergeOutcome, Page, ViewState, ViewUpdate};
    pub use crate::sync::{SyncChannel, SyncMessage};
    pub use crate::view::{detail_page, experiment_listings, DetailPage, ExperimentListing};
}
