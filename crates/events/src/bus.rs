//! In-process real-time bus backed by a `tokio::sync::broadcast` channel.
//!
//! Senders publish [`RealtimeEvent`]s addressed to a topic; the WebSocket
//! layer subscribes once and forwards each event to the connections whose
//! user matches the topic. The bus is shared via `Arc<RealtimeBus>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Topic for events addressed to one user.
pub fn user_topic(user_id: &str) -> String {
    format!("user:{user_id}")
}

/// An event pushed to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeEvent {
    /// Routing key, e.g. `user:u1`.
    pub topic: String,

    /// Dot-separated event name, e.g. `notification.created`.
    pub event: String,

    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl RealtimeEvent {
    pub fn new(topic: impl Into<String>, event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            topic: topic.into(),
            event: event.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// The user id if this event is addressed to a single user.
    pub fn user_id(&self) -> Option<&str> {
        self.topic.strip_prefix("user:")
    }
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus.
pub struct RealtimeBus {
    sender: broadcast::Sender<RealtimeEvent>,
}

impl RealtimeBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed events are dropped and
    /// slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Returns how many received it.
    pub fn publish(&self, event: RealtimeEvent) -> usize {
        // A send error only means there are zero receivers.
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.sender.subscribe()
    }
}

impl Default for RealtimeBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
