//! Event model, instance aggregation and persistence.
//!
//! - **`event`**: `Event`, `SubjectId` and the inbound `NewEvent` shape.
//! - **`instance`**: groups a flat event stream into per-subject `Instance`s.
//! - **`store`**: the `EventStore` trait with in-memory and PostgreSQL backends.

pub mod event;
pub mod instance;
pub mod store;

pub use event::{now_millis, Event, NewEvent, SubjectId};
pub use instance::{
    group_by_subject, sort_by_time, sorted_by_subject, try_group_by_subject, Instance, END_EVENT,
    START_EVENT,
};
pub use store::{fetch_history, EventStore, MemoryEventStore, PgEventStore};
