//! Real-time synchronization.
//!
//! - **`channel`**: [`SyncChannel`], a bounded tokio broadcast of
//!   [`SyncMessage::NewData`] notifications, and its subscribers.
//! - **`pump`**: the task that merges received messages into a
//!   [`LiveStateStore`](crate::state::LiveStateStore).
//!
//! Across processes the same messages travel as WebSocket text frames from
//! the server's `/ws` endpoint.

pub mod channel;
pub mod pump;

pub use channel::{SyncChannel, SyncMessage, SyncStats, SyncSubscriber};
pub use pump::{apply_message, spawn_store_sync};
