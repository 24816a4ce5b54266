//! Applies sync messages to a live state store.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::channel::{SyncMessage, SyncSubscriber};
use crate::state::{LiveStateStore, MergeOutcome};

/// Fold one message into the store.
pub fn apply_message(store: &LiveStateStore, message: SyncMessage) -> MergeOutcome {
    match message {
        SyncMessage::NewData(event) => store.merge_incoming_event(event),
    }
}

/// Spawn the task that merges every received message, in arrival order.
///
/// The task ends when the channel closes.
pub fn spawn_store_sync(mut subscriber: SyncSubscriber, store: Arc<LiveStateStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Store sync started");
        let mut merged: u64 = 0;

        while let Some(message) = subscriber.recv().await {
            let outcome = apply_message(&store, message);
            if outcome.is_applied() {
                merged += 1;
            }
            debug!(?outcome, "Sync message applied");
        }

        info!(merged, "Store sync stopped: channel closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use crate::sync::SyncChannel;

    #[tokio::test]
    async fn test_pump_merges_in_order() {
        let store = Arc::new(LiveStateStore::new());
        store.initialize(Vec::new(), vec![("ProbMatch".into(), Vec::new())]);

        let channel = SyncChannel::new(16);
        let handle = spawn_store_sync(channel.subscribe(), Arc::clone(&store));

        channel.publish(Event::new("ProbMatch", 1, "Start", 1));
        channel.publish(Event::new("ProbMatch", 1, "End", 2));
        channel.publish(Event::new("Unloaded", 1, "Start", 3));
        drop(channel);
        handle.await.unwrap();

        let state = store.snapshot();
        let instances = state.instances("ProbMatch").unwrap();
        assert_eq!(instances.len(), 1);
        let kinds: Vec<&str> = instances[0].data.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(kinds, vec!["Start", "End"]);
        assert!(!state.is_loaded("Unloaded"));
    }
}
