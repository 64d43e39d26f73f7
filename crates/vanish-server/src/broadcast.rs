//! Topic-keyed realtime fan-out.
//!
//! Stands in for the hosted pub/sub transport: every conversation has a
//! `messages:<id>` and a `conversations:<id>` channel, plus the global
//! `conversations` channel and per-user `notifications-<id>` channels.
//! Subscribers receive events published after they subscribed; there is no
//! replay and no ordering guarantee beyond the transport's delivery order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use vanish_shared::events::RealtimeEvent;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone, Default)]
pub struct Broadcaster {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<RealtimeEvent>>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a topic, creating the channel if needed.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<RealtimeEvent> {
        let mut channels = self.channels.lock().expect("broadcaster lock poisoned");
        channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publish an event to a topic.  Returns the number of subscribers the
    /// event reached; publishing to a topic nobody listens on is not an
    /// error.
    pub fn publish(&self, topic: &str, event: RealtimeEvent) -> usize {
        let sender = {
            let channels = self.channels.lock().expect("broadcaster lock poisoned");
            channels.get(topic).cloned()
        };

        match sender {
            Some(tx) => tx.send(event).unwrap_or(0),
            None => {
                tracing::trace!(topic, "no subscribers for event");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vanish_shared::types::ConversationId;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let hub = Broadcaster::new();
        let conv = ConversationId::new();
        let topic = conv.lifecycle_topic();

        let mut rx = hub.subscribe(&topic);
        let reached = hub.publish(
            &topic,
            RealtimeEvent::ConversationDeleted {
                conversation_id: conv,
            },
        );
        assert_eq!(reached, 1);

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, RealtimeEvent::ConversationDeleted { .. }));
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_silent() {
        let hub = Broadcaster::new();
        let conv = ConversationId::new();
        assert_eq!(
            hub.publish(
                &conv.message_topic(),
                RealtimeEvent::ConversationDeleted {
                    conversation_id: conv
                }
            ),
            0
        );
    }
}
