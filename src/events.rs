//! Status events for the overlay
//!
//! The assistant reports what it is doing on an in-process broadcast
//! channel; the overlay server relays every event to its websocket clients.
//! Publishing is best-effort and never blocks: with nobody listening the
//! event is dropped, and slow subscribers lose old events.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

/// Buffered events per subscriber before it starts lagging
const CHANNEL_CAPACITY: usize = 64;

/// Something the assistant did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusEvent {
    /// Microphone armed for a command
    Listening,
    /// Transcript of what the user said
    Heard { text: String },
    /// Text the assistant replied with
    Reply { text: String },
    /// A target was resolved and launched
    Opened { kind: String, path: String },
    /// A target could not be resolved
    NotFound { target: String },
    /// Something failed
    Error { message: String },
}

/// Broadcast channel of JSON events
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Value>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a bus with no subscribers
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an arbitrary JSON event
    ///
    /// Returns the number of subscribers that will see it.
    pub fn publish(&self, event: Value) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Publish a status event
    pub fn status(&self, event: &StatusEvent) {
        match serde_json::to_value(event) {
            Ok(value) => {
                let receivers = self.publish(value);
                tracing::trace!(?event, receivers, "status event");
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize status event"),
        }
    }

    /// Subscribe to events published from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.tx.subscribe()
    }

    /// Number of live subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_event_json() {
        let value = serde_json::to_value(StatusEvent::Opened {
            kind: "indexed_app".to_string(),
            path: "/apps/chrome.exe".to_string(),
        })
        .unwrap();
        assert_eq!(
            value,
            json!({"type": "opened", "kind": "indexed_app", "path": "/apps/chrome.exe"})
        );
        assert_eq!(
            serde_json::to_value(StatusEvent::Listening).unwrap(),
            json!({"type": "listening"})
        );
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(json!({"x": 1})), 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.status(&StatusEvent::Listening);
        bus.publish(json!({"custom": true}));

        assert_eq!(rx.recv().await.unwrap(), json!({"type": "listening"}));
        assert_eq!(rx.recv().await.unwrap(), json!({"custom": true}));
    }
}
