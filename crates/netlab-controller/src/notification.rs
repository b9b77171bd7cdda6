//! Lifecycle notifications.
//!
//! Projects emit `(action, event)` pairs such as `node.created` on a
//! [`NotificationBus`] backed by a tokio broadcast channel. Emission is fire
//! and forget: with nobody subscribed the event is simply dropped.
//! Subscribers read through a [`NotificationQueue`], which interleaves `ping`
//! keep-alives whenever the stream is idle.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub const PING: &str = "ping";

/// One emitted event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub action: String,
    pub event: Value,
}

/// Broadcast sink shared by the controller and its projects.
#[derive(Clone)]
pub struct NotificationBus {
    sender: Arc<broadcast::Sender<Notification>>,
    started: Instant,
}

impl NotificationBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        NotificationBus {
            sender: Arc::new(sender),
            started: Instant::now(),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Emits `action` with the serialized `event` to every subscriber.
    pub fn emit<T: Serialize + ?Sized>(&self, action: &str, event: &T) {
        let event = match serde_json::to_value(event) {
            Ok(value) => value,
            Err(err) => {
                warn!("Dropping {} notification: {}", action, err);
                return;
            }
        };
        debug!("Emitting {}", action);
        let delivered = self
            .sender
            .send(Notification {
                action: action.to_string(),
                event,
            })
            .unwrap_or(0);
        if delivered == 0 {
            debug!("No subscribers listening to {}", action);
        }
    }

    pub fn subscribe(&self) -> NotificationQueue {
        NotificationQueue {
            receiver: self.sender.subscribe(),
            sender: Arc::downgrade(&self.sender),
            started: self.started,
            pinged: false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Errors from reading a notification queue.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification bus is closed")]
    Closed,
}

/// A subscriber's view of the bus.
pub struct NotificationQueue {
    receiver: broadcast::Receiver<Notification>,
    sender: Weak<broadcast::Sender<Notification>>,
    started: Instant,
    pinged: bool,
}

impl NotificationQueue {
    /// Next notification, or a `ping` if none arrives within `timeout`.
    ///
    /// The very first call always answers with a `ping` so a fresh
    /// subscriber gets immediate feedback.
    pub async fn get(&mut self, timeout: Duration) -> Result<Notification, NotificationError> {
        if !self.pinged {
            self.pinged = true;
            return Ok(self.ping());
        }
        loop {
            match tokio::time::timeout(timeout, self.receiver.recv()).await {
                Err(_) => return Ok(self.ping()),
                Ok(Ok(notification)) => return Ok(notification),
                Ok(Err(broadcast::error::RecvError::Lagged(n))) => {
                    warn!("Notification subscriber lagged by {} events", n);
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => return Err(NotificationError::Closed),
            }
        }
    }

    /// Like [`get`](Self::get), rendered as `{"action": ..., "event": ...}`
    /// with sorted keys.
    pub async fn get_json(&mut self, timeout: Duration) -> Result<String, NotificationError> {
        let notification = self.get(timeout).await?;
        let mut map = Map::new();
        map.insert("action".to_string(), Value::String(notification.action));
        map.insert("event".to_string(), notification.event);
        Ok(Value::Object(map).to_string())
    }

    fn ping(&self) -> Notification {
        let subscribers = self
            .sender
            .upgrade()
            .map(|sender| sender.receiver_count())
            .unwrap_or(0);
        Notification {
            action: PING.to_string(),
            event: json!({
                "uptime": self.started.elapsed().as_secs(),
                "subscribers": subscribers,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_get_is_a_ping() {
        let bus = NotificationBus::new(10);
        let mut queue = bus.subscribe();
        bus.emit("node.created", &json!({"name": "R1"}));

        let first = queue.get(Duration::from_millis(50)).await.unwrap();
        assert_eq!(first.action, PING);
        assert_eq!(first.event["subscribers"], json!(1));

        let second = queue.get(Duration::from_millis(50)).await.unwrap();
        assert_eq!(second.action, "node.created");
        assert_eq!(second.event["name"], json!("R1"));
    }

    #[tokio::test]
    async fn idle_queue_pings() {
        let bus = NotificationBus::new(10);
        let mut queue = bus.subscribe();
        queue.get(Duration::from_millis(10)).await.unwrap();
        let idle = queue.get(Duration::from_millis(10)).await.unwrap();
        assert_eq!(idle.action, PING);
    }

    #[tokio::test]
    async fn json_rendering_sorts_keys() {
        let bus = NotificationBus::new(10);
        let mut queue = bus.subscribe();
        queue.get(Duration::from_millis(10)).await.unwrap();
        bus.emit("project.closed", &json!({"zoom": 100, "name": "lab1"}));
        let text = queue.get_json(Duration::from_millis(50)).await.unwrap();
        assert_eq!(
            text,
            r#"{"action":"project.closed","event":{"name":"lab1","zoom":100}}"#
        );
    }

    #[test]
    fn emitting_without_subscribers_is_harmless() {
        let bus = NotificationBus::default();
        bus.emit("node.deleted", &json!({}));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn dropped_bus_closes_queues() {
        let bus = NotificationBus::new(4);
        let mut queue = bus.subscribe();
        queue.get(Duration::from_millis(10)).await.unwrap();
        drop(bus);
        assert!(queue.get(Duration::from_millis(10)).await.is_err());
    }
}
