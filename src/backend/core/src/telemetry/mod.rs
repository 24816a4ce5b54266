//! Telemetry: structured logging and Prometheus metrics.
//!
//! - **Logging**: `tracing-subscriber` with JSON, pretty or compact output
//! - **Metrics**: counters exported in Prometheus text format
//!
//! # Example
//!
//! ```rust,no_run
//! use mindcraft_core::config::LoggingConfig;
//! use mindcraft_core::telemetry::{init_logging, init_metrics};
//!
//! init_logging(&LoggingConfig::default()).expect("logging");
//! let handle = init_metrics("mindcraft-server").expect("metrics");
//! println!("{}", handle.render());
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{build_filter, init_logging};
pub use metrics::{init_metrics, record_event_saved};
