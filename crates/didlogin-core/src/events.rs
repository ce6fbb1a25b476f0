//! Typed event bus connecting the agent, the authentication listener and real-time clients.
use crate::message::Message;
use futures::stream::{self, Stream};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast::{self, error::RecvError};

/// Default number of buffered events per subscriber.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// Events emitted by an agent.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A validated message was saved.
    SavedMessage(Message),
}

/// Real-time notifications pushed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    /// A session in the room logged in as `did`.
    LoggedIn { did: String },
}

impl Notification {
    /// Event name seen by clients.
    pub fn name(&self) -> &'static str {
        match self {
            Notification::LoggedIn { .. } => "loggedin",
        }
    }

    /// Event payload seen by clients.
    pub fn payload(&self) -> Value {
        match self {
            Notification::LoggedIn { did } => json!({ "did": did }),
        }
    }
}

/// A notification scoped to a room (a session id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomEvent {
    pub room: String,
    pub notification: Notification,
}

/// Multi-producer, multi-consumer broadcast of events of one type.
#[derive(Debug)]
pub struct EventBus<E> {
    sender: broadcast::Sender<E>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<E: Clone + Send + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl<E: Clone + Send + 'static> EventBus<E> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event without waiting for subscribers. Returns the number of receivers.
    pub fn publish(&self, event: E) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("Event published with no subscribers.");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventBus<RoomEvent> {
    /// Stream of notifications for a single room. Ends when the bus is dropped.
    pub fn room_stream(&self, room: &str) -> impl Stream<Item = Notification> + Send + 'static {
        let receiver = self.subscribe();
        let room = room.to_owned();
        stream::unfold(receiver, move |mut receiver| {
            let room = room.clone();
            async move {
                loop {
                    match receiver.recv().await {
                        Ok(event) if event.room == room => {
                            return Some((event.notification, receiver))
                        }
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Room {} subscriber lagged, {} events skipped.", room, skipped);
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_notification_wire_format() {
        let notification = Notification::LoggedIn {
            did: "did:example:abc".to_string(),
        };
        assert_eq!(notification.name(), "loggedin");
        assert_eq!(notification.payload(), json!({"did": "did:example:abc"}));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus: EventBus<RoomEvent> = EventBus::default();
        assert_eq!(bus.subscriber_count(), 0);
        let receivers = bus.publish(RoomEvent {
            room: "a".to_string(),
            notification: Notification::LoggedIn {
                did: "did:example:abc".to_string(),
            },
        });
        assert_eq!(receivers, 0);
    }

    #[tokio::test]
    async fn test_room_stream_filters_rooms() {
        let bus: EventBus<RoomEvent> = EventBus::new(8);
        let mut stream = Box::pin(bus.room_stream("sess-123"));

        bus.publish(RoomEvent {
            room: "other".to_string(),
            notification: Notification::LoggedIn {
                did: "did:example:other".to_string(),
            },
        });
        bus.publish(RoomEvent {
            room: "sess-123".to_string(),
            notification: Notification::LoggedIn {
                did: "did:example:abc".to_string(),
            },
        });

        assert_eq!(
            stream.next().await,
            Some(Notification::LoggedIn {
                did: "did:example:abc".to_string()
            })
        );
        drop(bus);
        assert_eq!(stream.next().await, None);
    }
}
