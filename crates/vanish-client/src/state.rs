//! Logged-in session state.
//!
//! Thin wrapper tying the local profile to a cache handle, plus the
//! read-side views the UI renders from.  Expiry is enforced here: the
//! server never deletes expired rows, so every message read filters on
//! `expires_at` at render time.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use vanish_shared::records::{Conversation, ConversationPermissions, Profile};
use vanish_shared::types::ConversationId;

use crate::cache::{CacheEntry, CacheKey, CachedMessage, QueryCache};

pub struct ClientState {
    pub profile: Profile,
    pub cache: Arc<QueryCache>,
}

impl ClientState {
    pub fn new(profile: Profile, cache: Arc<QueryCache>) -> Self {
        Self { profile, cache }
    }

    /// Messages of a conversation as the UI should show them: oldest
    /// first, expired records filtered out.  Pending and failed records
    /// stay visible regardless (the user just wrote them).
    pub fn visible_messages(
        &self,
        conversation_id: ConversationId,
        now: DateTime<Utc>,
    ) -> Vec<CachedMessage> {
        self.cache
            .messages(conversation_id)
            .into_iter()
            .filter(|c| !c.message.is_expired(now) || !matches!(c.state, crate::cache::DeliveryState::Confirmed))
            .collect()
    }

    /// Cached conversation list, newest activity first as the server
    /// returned it.  Empty when not yet fetched.
    pub fn conversations(&self) -> Vec<Conversation> {
        match self.cache.get(&CacheKey::Conversations) {
            Some(CacheEntry::Conversations(list)) => list,
            _ => Vec::new(),
        }
    }

    pub fn permissions(&self, conversation_id: ConversationId) -> Option<ConversationPermissions> {
        match self.cache.get(&CacheKey::Permissions(conversation_id)) {
            Some(CacheEntry::Permissions(p)) => p,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use vanish_shared::api::SendMessageRequest;
    use vanish_shared::types::{ConversationId, MessageKind, UserId};

    use super::*;
    use crate::pipeline::test_support::{profile, server_message};

    #[test]
    fn expired_messages_are_hidden_but_retained() {
        let cache = Arc::new(QueryCache::new());
        let me = UserId::new();
        let state = ClientState::new(profile(me), cache.clone());
        let conv = ConversationId::new();

        let req = SendMessageRequest {
            conversation_id: conv,
            content: "short lived".into(),
            message_type: MessageKind::Text,
            expiration_hours: Some(1),
            reply_to: None,
        };
        let mut short_lived = server_message(me, &req);
        short_lived.expires_at = Utc::now() - Duration::minutes(1);
        let fresh = server_message(me, &req);

        cache.append_message(conv, CachedMessage::confirmed(short_lived.clone()));
        cache.append_message(conv, CachedMessage::confirmed(fresh.clone()));

        let visible = state.visible_messages(conv, Utc::now());
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].message.id, fresh.id);

        // The record itself still exists in the cache.
        assert!(cache.contains_message(conv, short_lived.id));
    }
}
