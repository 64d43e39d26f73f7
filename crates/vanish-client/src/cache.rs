//! Typed query cache.
//!
//! One [`QueryCache`] per logged-in client.  Every slot is addressed by a
//! [`CacheKey`] and holds a [`CacheEntry`] variant matching that key, so a
//! reader can never mistake a conversation list for a message list.
//!
//! Slots carry a generation counter for fetch coordination: a fetch takes
//! a [`FetchToken`] at the start, and `complete_fetch` only lands the
//! result if no one bumped the generation in between.  The optimistic
//! send pipeline bumps the generation of the conversation it writes to,
//! so an in-flight refetch that started before the optimistic append
//! cannot clobber it.
//!
//! Mutations publish the dirty key on a broadcast channel; subscribers
//! (the UI) re-read the slot on notification.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::debug;

use vanish_shared::api::SendMessageRequest;
use vanish_shared::records::{Conversation, ConversationPermissions, Message};
use vanish_shared::types::{ConversationId, MessageId, UserId};

const DIRTY_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Conversations,
    Messages(ConversationId),
    Permissions(ConversationId),
}

/// Delivery state of a message as the local client knows it.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryState {
    /// Acknowledged by the server (or arrived via realtime).
    Confirmed,
    /// Optimistically appended, send still in flight.  The original
    /// request is retained so a retry can resend it verbatim.
    Pending { payload: SendMessageRequest },
    /// The send failed; the record stays visible and retryable.
    Failed { payload: SendMessageRequest },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedMessage {
    pub message: Message,
    pub state: DeliveryState,
}

impl CachedMessage {
    pub fn confirmed(message: Message) -> Self {
        Self {
            message,
            state: DeliveryState::Confirmed,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, DeliveryState::Pending { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, DeliveryState::Failed { .. })
    }
}

/// A page-structured message list: pages ordered oldest-first, messages
/// ascending within a page.  The last page is the newest; optimistic
/// appends go there.
pub type MessagePages = Vec<Vec<CachedMessage>>;

#[derive(Debug, Clone)]
pub enum CacheEntry {
    Conversations(Vec<Conversation>),
    Messages(MessagePages),
    Permissions(Option<ConversationPermissions>),
}

/// Handed out by [`QueryCache::begin_fetch`]; pins the slot generation
/// the fetch started at.
#[derive(Debug, Clone)]
pub struct FetchToken {
    key: CacheKey,
    generation: u64,
}

#[derive(Debug, Default)]
struct Slot {
    entry: Option<CacheEntry>,
    generation: u64,
}

pub struct QueryCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
    dirty_tx: broadcast::Sender<CacheKey>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        let (dirty_tx, _) = broadcast::channel(DIRTY_CHANNEL_CAPACITY);
        Self {
            slots: Mutex::new(HashMap::new()),
            dirty_tx,
        }
    }

    /// Receive change notifications.  Each mutation sends the key of the
    /// slot that changed.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheKey> {
        self.dirty_tx.subscribe()
    }

    fn notify(&self, key: &CacheKey) {
        // No receivers is fine.
        let _ = self.dirty_tx.send(key.clone());
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let slots = self.slots.lock().expect("cache lock poisoned");
        slots.get(key).and_then(|slot| slot.entry.clone())
    }

    pub fn set(&self, key: CacheKey, entry: CacheEntry) {
        {
            let mut slots = self.slots.lock().expect("cache lock poisoned");
            let slot = slots.entry(key.clone()).or_default();
            slot.entry = Some(entry);
            slot.generation += 1;
        }
        self.notify(&key);
    }

    /// Drop the cached value and bump the generation.  Subscribers are
    /// told so they can refetch.
    pub fn invalidate(&self, key: &CacheKey) {
        {
            let mut slots = self.slots.lock().expect("cache lock poisoned");
            let slot = slots.entry(key.clone()).or_default();
            slot.entry = None;
            slot.generation += 1;
        }
        self.notify(key);
    }

    /// Remove the slot entirely (the conversation no longer exists).
    pub fn remove(&self, key: &CacheKey) {
        let removed = {
            let mut slots = self.slots.lock().expect("cache lock poisoned");
            slots.remove(key).is_some()
        };
        if removed {
            self.notify(key);
        }
    }

    /// Bump the slot generation without touching its data, so any fetch
    /// started earlier lands on the floor.
    pub fn cancel_pending_fetch(&self, key: &CacheKey) {
        let mut slots = self.slots.lock().expect("cache lock poisoned");
        slots.entry(key.clone()).or_default().generation += 1;
    }

    pub fn begin_fetch(&self, key: CacheKey) -> FetchToken {
        let mut slots = self.slots.lock().expect("cache lock poisoned");
        let generation = slots.entry(key.clone()).or_default().generation;
        FetchToken { key, generation }
    }

    /// Land a fetch result.  Returns `false` (and leaves the slot alone)
    /// if the generation moved since `begin_fetch`, meaning a local write
    /// or cancellation superseded this fetch.
    pub fn complete_fetch(&self, token: FetchToken, entry: CacheEntry) -> bool {
        let landed = {
            let mut slots = self.slots.lock().expect("cache lock poisoned");
            let slot = slots.entry(token.key.clone()).or_default();
            if slot.generation != token.generation {
                debug!(key = ?token.key, "discarding stale fetch result");
                false
            } else {
                slot.entry = Some(entry);
                true
            }
        };
        if landed {
            self.notify(&token.key);
        }
        landed
    }

    fn with_pages<R>(
        &self,
        conversation_id: ConversationId,
        f: impl FnOnce(&mut MessagePages) -> R,
    ) -> R {
        let key = CacheKey::Messages(conversation_id);
        let result = {
            let mut slots = self.slots.lock().expect("cache lock poisoned");
            let slot = slots.entry(key.clone()).or_default();
            let pages = match &mut slot.entry {
                Some(CacheEntry::Messages(pages)) => pages,
                other => {
                    *other = Some(CacheEntry::Messages(Vec::new()));
                    match other {
                        Some(CacheEntry::Messages(pages)) => pages,
                        _ => unreachable!(),
                    }
                }
            };
            f(pages)
        };
        self.notify(&key);
        result
    }

    /// Append to the end of the newest page.
    pub fn append_message(&self, conversation_id: ConversationId, cached: CachedMessage) {
        self.with_pages(conversation_id, |pages| {
            if pages.is_empty() {
                pages.push(Vec::new());
            }
            pages.last_mut().expect("page exists").push(cached);
        });
    }

    /// Replace the record with the given id, wherever it sits.
    pub fn replace_message(
        &self,
        conversation_id: ConversationId,
        id: MessageId,
        replacement: CachedMessage,
    ) -> bool {
        self.with_pages(conversation_id, |pages| {
            for page in pages.iter_mut() {
                if let Some(slot) = page.iter_mut().find(|c| c.message.id == id) {
                    *slot = replacement;
                    return true;
                }
            }
            false
        })
    }

    pub fn remove_message(&self, conversation_id: ConversationId, id: MessageId) -> bool {
        self.with_pages(conversation_id, |pages| {
            let mut removed = false;
            for page in pages.iter_mut() {
                let before = page.len();
                page.retain(|c| c.message.id != id);
                removed |= page.len() != before;
            }
            removed
        })
    }

    pub fn contains_message(&self, conversation_id: ConversationId, id: MessageId) -> bool {
        let slots = self.slots.lock().expect("cache lock poisoned");
        match slots
            .get(&CacheKey::Messages(conversation_id))
            .and_then(|s| s.entry.as_ref())
        {
            Some(CacheEntry::Messages(pages)) => pages
                .iter()
                .any(|page| page.iter().any(|c| c.message.id == id)),
            _ => false,
        }
    }

    /// Flip a pending record to failed, keeping its payload for retry.
    pub fn mark_message_failed(&self, conversation_id: ConversationId, id: MessageId) -> bool {
        self.with_pages(conversation_id, |pages| {
            for page in pages.iter_mut() {
                for cached in page.iter_mut() {
                    if cached.message.id == id {
                        if let DeliveryState::Pending { payload } = cached.state.clone() {
                            cached.state = DeliveryState::Failed { payload };
                            return true;
                        }
                        return false;
                    }
                }
            }
            false
        })
    }

    /// Remove a failed record and hand back its payload for resending.
    pub fn take_failed_payload(
        &self,
        conversation_id: ConversationId,
        id: MessageId,
    ) -> Option<SendMessageRequest> {
        self.with_pages(conversation_id, |pages| {
            for page in pages.iter_mut() {
                if let Some(pos) = page
                    .iter()
                    .position(|c| c.message.id == id && c.is_failed())
                {
                    let cached = page.remove(pos);
                    if let DeliveryState::Failed { payload } = cached.state {
                        return Some(payload);
                    }
                }
            }
            None
        })
    }

    /// Swap the oldest pending record from `sender` for the confirmed
    /// server copy.  Used when the realtime broadcast of our own message
    /// arrives before (or instead of) the HTTP acknowledgement.
    pub fn replace_first_pending_from(
        &self,
        conversation_id: ConversationId,
        sender: UserId,
        message: Message,
    ) -> bool {
        self.with_pages(conversation_id, |pages| {
            for page in pages.iter_mut() {
                if let Some(slot) = page
                    .iter_mut()
                    .find(|c| c.is_pending() && c.message.sender_id == sender)
                {
                    *slot = CachedMessage::confirmed(message);
                    return true;
                }
            }
            false
        })
    }

    /// All cached records for a conversation, oldest first.
    pub fn messages(&self, conversation_id: ConversationId) -> Vec<CachedMessage> {
        let slots = self.slots.lock().expect("cache lock poisoned");
        match slots
            .get(&CacheKey::Messages(conversation_id))
            .and_then(|s| s.entry.as_ref())
        {
            Some(CacheEntry::Messages(pages)) => pages.iter().flatten().cloned().collect(),
            _ => Vec::new(),
        }
    }
}
