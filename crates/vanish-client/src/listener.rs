//! Realtime merge listener.
//!
//! Consumes broadcast events and reconciles them into the query cache.
//! The tricky case is our own message coming back over the message topic:
//! if a pending record from the same sender is waiting, the broadcast
//! copy replaces it in place instead of appending, so a send never shows
//! up twice no matter whether the HTTP acknowledgement or the broadcast
//! arrives first.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use vanish_shared::events::RealtimeEvent;

use crate::cache::{CacheKey, CachedMessage, QueryCache};
use crate::notices::Notice;

pub struct RealtimeListener {
    cache: Arc<QueryCache>,
    notices: mpsc::UnboundedSender<Notice>,
}

impl RealtimeListener {
    pub fn new(cache: Arc<QueryCache>, notices: mpsc::UnboundedSender<Notice>) -> Self {
        Self { cache, notices }
    }

    /// Drain events until the sender side closes.  Lagged receivers skip
    /// ahead; the cache invalidations triggered by later events make the
    /// UI refetch whatever was missed.
    pub async fn run(&self, mut events: broadcast::Receiver<RealtimeEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.apply(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "realtime receiver lagged; continuing");
                    self.cache.invalidate(&CacheKey::Conversations);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("realtime channel closed, listener exiting");
                    return;
                }
            }
        }
    }

    /// Merge a single event into the cache.
    pub fn apply(&self, event: RealtimeEvent) {
        match event {
            RealtimeEvent::NewMessage { message } => {
                let conversation_id = message.conversation_id;
                let sender = message.sender_id;

                // Our own send echoing back: swap it for the pending
                // record rather than appending a duplicate.
                if self
                    .cache
                    .replace_first_pending_from(conversation_id, sender, message.clone())
                {
                    return;
                }
                if !self.cache.contains_message(conversation_id, message.id) {
                    self.cache
                        .append_message(conversation_id, CachedMessage::confirmed(message));
                }
            }
            RealtimeEvent::MessageUpdated { message } => {
                let conversation_id = message.conversation_id;
                let id = message.id;
                self.cache
                    .replace_message(conversation_id, id, CachedMessage::confirmed(message));
            }
            RealtimeEvent::MessageDeleted {
                conversation_id,
                message_id,
            } => {
                self.cache.remove_message(conversation_id, message_id);
            }
            RealtimeEvent::MemberLeft {
                conversation_id,
                user_id,
            } => {
                self.cache.invalidate(&CacheKey::Conversations);
                self.cache
                    .invalidate(&CacheKey::Permissions(conversation_id));
                let _ = self.notices.send(Notice::MemberLeft {
                    conversation_id,
                    user_id,
                });
            }
            RealtimeEvent::ConversationDeleted { conversation_id } => {
                self.cache.remove(&CacheKey::Messages(conversation_id));
                self.cache.remove(&CacheKey::Permissions(conversation_id));
                self.cache.invalidate(&CacheKey::Conversations);
                let _ = self
                    .notices
                    .send(Notice::ConversationDeleted { conversation_id });
            }
            RealtimeEvent::ConversationChanged { .. } => {
                self.cache.invalidate(&CacheKey::Conversations);
            }
            RealtimeEvent::NotificationCreated { notification } => {
                let _ = self.notices.send(Notice::Notification(notification));
            }
        }
    }
}
