//! Fire-and-forget broadcast of newly persisted events.
//!
//! Delivery is at-most-once with no acknowledgement and no replay. Each
//! subscriber has a bounded buffer; one that falls behind loses the oldest
//! messages and the loss is counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::Result;
use crate::events::Event;
use crate::telemetry::metrics::SYNC_PUBLISHED_TOTAL;

// ═══════════════════════════════════════════════════════════════════════════════
// Messages
// ═══════════════════════════════════════════════════════════════════════════════

/// A push notification. Encoded as `{"type":"newData","data":{...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SyncMessage {
    /// An event was persisted.
    #[serde(rename = "newData")]
    NewData(Event),
}

impl SyncMessage {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn event(&self) -> &Event {
        match self {
            Self::NewData(event) => event,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Statistics
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time channel statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub published: u64,
    /// Sum of receivers reached per publish.
    pub delivered: u64,
    /// Messages lost by lagging subscribers.
    pub dropped: u64,
    pub subscribers: usize,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Channel
// ═══════════════════════════════════════════════════════════════════════════════

/// In-process realtime push transport. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SyncChannel {
    sender: broadcast::Sender<SyncMessage>,
    counters: Arc<Counters>,
    capacity: usize,
}

impl SyncChannel {
    /// Create a channel whose subscribers buffer up to `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            counters: Arc::new(Counters::default()),
            capacity,
        }
    }

    /// Broadcast an event to every current subscriber.
    ///
    /// Returns how many subscribers it reached; zero is not an error.
    pub fn publish(&self, event: Event) -> usize {
        self.counters.published.fetch_add(1, Ordering::Relaxed);
        counter!(SYNC_PUBLISHED_TOTAL).increment(1);

        let experiment = event.experiment.clone();
        match self.sender.send(SyncMessage::NewData(event)) {
            Ok(receivers) => {
                self.counters
                    .delivered
                    .fetch_add(receivers as u64, Ordering::Relaxed);
                debug!(experiment = %experiment, subscribers = receivers, "newData published");
                receivers
            }
            Err(_) => {
                debug!(experiment = %experiment, "newData published with no subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> SyncSubscriber {
        SyncSubscriber {
            receiver: self.sender.subscribe(),
            counters: Arc::clone(&self.counters),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            published: self.counters.published.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            subscribers: self.subscriber_count(),
        }
    }
}

/// Receiving end of a [`SyncChannel`].
#[derive(Debug)]
pub struct SyncSubscriber {
    receiver: broadcast::Receiver<SyncMessage>,
    counters: Arc<Counters>,
}

impl SyncSubscriber {
    /// Next message, skipping over any lost to lag. `None` once the channel closes.
    pub async fn recv(&mut self) -> Option<SyncMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    self.counters.dropped.fetch_add(missed, Ordering::Relaxed);
                    warn!(missed, "Sync subscriber lagged; messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(subject: i64) -> Event {
        Event::new("ProbMatch", subject, "Start", 1_000)
    }

    #[test]
    fn test_wire_format() {
        let message = SyncMessage::NewData(event(1));
        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "newData",
                "data": {"experiment": "ProbMatch", "subject": 1, "event": "Start", "time": 1000}
            })
        );
        assert_eq!(SyncMessage::from_json(&value.to_string()).unwrap(), message);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(SyncMessage::from_json(r#"{"type":"other","data":{}}"#).is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let channel = SyncChannel::new(8);
        assert_eq!(channel.publish(event(1)), 0);
        let stats = channel.stats();
        assert_eq!(stats.published, 1);
        assert_eq!(stats.delivered, 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let channel = SyncChannel::new(8);
        let mut a = channel.subscribe();
        let mut b = channel.subscribe();

        assert_eq!(channel.publish(event(1)), 2);
        assert_eq!(a.recv().await.unwrap().event().subject.as_integer(), Some(1));
        assert_eq!(b.recv().await.unwrap().event().subject.as_integer(), Some(1));
        assert_eq!(channel.stats().delivered, 2);
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscribers() {
        let channel = SyncChannel::new(8);
        let _early = channel.subscribe();
        channel.publish(event(1));

        let mut late = channel.subscribe();
        channel.publish(event(2));
        assert_eq!(late.recv().await.unwrap().event().subject.as_integer(), Some(2));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_counts_drops() {
        let channel = SyncChannel::new(2);
        let mut slow = channel.subscribe();
        for subject in 0..5 {
            channel.publish(event(subject));
        }

        let first = slow.recv().await.unwrap();
        assert_eq!(first.event().subject.as_integer(), Some(3));
        assert_eq!(channel.stats().dropped, 3);
    }

    #[tokio::test]
    async fn test_closed_channel_ends_subscriber() {
        let channel = SyncChannel::new(2);
        let mut subscriber = channel.subscribe();
        drop(channel);
        assert!(subscriber.recv().await.is_none());
    }
}
