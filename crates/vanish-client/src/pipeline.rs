//! Optimistic message pipeline.
//!
//! Sending appends a pending record to the cache before the request goes
//! out, so the composer clears and the message renders immediately.  The
//! server acknowledgement replaces the pending record in place; a failure
//! flips it to failed and keeps the payload so the user can retry.
//!
//! Any in-flight message refetch for the conversation is cancelled before
//! the optimistic append, otherwise a fetch snapshot taken before the
//! append could land afterwards and erase it.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use vanish_shared::api::{
    CreateConversationRequest, GetMessagesRequest, SendMessageRequest,
};
use vanish_shared::records::{expiry_from, validate_content, Conversation, Message, Profile};
use vanish_shared::types::{ConversationId, InviteStatus, MessageId, MessageKind};

use crate::api::ConversationApi;
use crate::cache::{CacheEntry, CacheKey, CachedMessage, DeliveryState, QueryCache};
use crate::error::ClientError;
use crate::notices::Notice;

pub struct MessagePipeline<A: ConversationApi> {
    api: A,
    cache: Arc<QueryCache>,
    profile: Profile,
    notices: mpsc::UnboundedSender<Notice>,
}

impl<A: ConversationApi> MessagePipeline<A> {
    pub fn new(
        api: A,
        cache: Arc<QueryCache>,
        profile: Profile,
        notices: mpsc::UnboundedSender<Notice>,
    ) -> Self {
        Self {
            api,
            cache,
            profile,
            notices,
        }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Send a message optimistically.
    ///
    /// On success the pending record is replaced in place by the server
    /// copy and the conversation list is invalidated (its ordering key
    /// moved).  On failure the record stays, flagged as failed.
    pub async fn send_message(
        &self,
        conversation_id: ConversationId,
        content: &str,
        kind: MessageKind,
        expiration_hours: Option<i64>,
        reply_to: Option<MessageId>,
    ) -> Result<Message, ClientError> {
        let content = validate_content(content)?;

        let request = SendMessageRequest {
            conversation_id,
            content: content.clone(),
            message_type: kind,
            expiration_hours,
            reply_to,
        };

        let now = Utc::now();
        let local = Message {
            id: MessageId::new(),
            conversation_id,
            sender_id: self.profile.user_id,
            content,
            kind,
            created_at: now,
            expires_at: expiry_from(now, expiration_hours),
            read_by: Default::default(),
            edited_at: None,
            reply_to,
            screenshot_detected: false,
        };
        let local_id = local.id;

        let key = CacheKey::Messages(conversation_id);
        self.cache.cancel_pending_fetch(&key);
        self.cache.append_message(
            conversation_id,
            CachedMessage {
                message: local,
                state: DeliveryState::Pending {
                    payload: request.clone(),
                },
            },
        );

        match self.api.send_message(request).await {
            Ok(message) => {
                debug!(message_id = %message.id, "send acknowledged");
                let confirmed = CachedMessage::confirmed(message.clone());
                // The realtime listener may have already swapped the
                // pending record for the broadcast copy.
                if !self.cache.replace_message(conversation_id, local_id, confirmed.clone())
                    && !self.cache.contains_message(conversation_id, message.id)
                {
                    self.cache.append_message(conversation_id, confirmed);
                }
                self.cache.invalidate(&CacheKey::Conversations);
                Ok(message)
            }
            Err(e) => {
                warn!(error = %e, conversation_id = %conversation_id, "send failed");
                self.cache.mark_message_failed(conversation_id, local_id);
                let _ = self.notices.send(Notice::SendFailed { conversation_id });
                Err(e)
            }
        }
    }

    /// Retry a failed send.  The failed record is removed and the original
    /// payload resent as a fresh attempt; either way the message list is
    /// invalidated so the next read refetches an authoritative page.
    pub async fn retry_message(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
    ) -> Result<Message, ClientError> {
        let payload = self
            .cache
            .take_failed_payload(conversation_id, message_id)
            .ok_or(ClientError::NotFound)?;

        let result = self.api.send_message(payload).await;
        self.cache.invalidate(&CacheKey::Messages(conversation_id));
        if result.is_ok() {
            self.cache.invalidate(&CacheKey::Conversations);
        }
        result
    }

    /// Fetch a message page into the cache, newest page last.  A local
    /// write between request and response wins; the stale snapshot is
    /// dropped.
    pub async fn refresh_messages(
        &self,
        conversation_id: ConversationId,
        limit: u32,
        offset: u32,
    ) -> Result<(), ClientError> {
        let key = CacheKey::Messages(conversation_id);
        let token = self.cache.begin_fetch(key.clone());
        let messages = self
            .api
            .get_messages(GetMessagesRequest {
                conversation_id,
                limit,
                offset,
            })
            .await?;
        let page = messages.into_iter().map(CachedMessage::confirmed).collect();
        self.cache.complete_fetch(token, CacheEntry::Messages(vec![page]));
        Ok(())
    }

    pub async fn refresh_conversations(
        &self,
        status: Option<InviteStatus>,
    ) -> Result<(), ClientError> {
        let token = self.cache.begin_fetch(CacheKey::Conversations);
        let conversations = self.api.get_conversations(status).await?;
        self.cache
            .complete_fetch(token, CacheEntry::Conversations(conversations));
        Ok(())
    }

    pub async fn refresh_permissions(
        &self,
        conversation_id: ConversationId,
    ) -> Result<(), ClientError> {
        let key = CacheKey::Permissions(conversation_id);
        let token = self.cache.begin_fetch(key);
        let permissions = self.api.get_user_permissions(conversation_id).await?;
        self.cache
            .complete_fetch(token, CacheEntry::Permissions(permissions));
        Ok(())
    }

    pub async fn create_conversation(
        &self,
        req: CreateConversationRequest,
    ) -> Result<Conversation, ClientError> {
        let conversation = self.api.create_conversation(req).await?;
        self.cache.invalidate(&CacheKey::Conversations);
        Ok(conversation)
    }

    /// Leave a conversation.  When the server reports the conversation was
    /// deleted as a consequence, its cache slots are dropped outright.
    pub async fn leave_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<bool, ClientError> {
        let resp = self.api.leave_conversation(conversation_id).await?;
        if resp.deleted {
            self.cache.remove(&CacheKey::Messages(conversation_id));
            self.cache.remove(&CacheKey::Permissions(conversation_id));
        } else {
            self.cache.invalidate(&CacheKey::Permissions(conversation_id));
        }
        self.cache.invalidate(&CacheKey::Conversations);
        Ok(resp.deleted)
    }

    pub async fn respond_to_invitation(
        &self,
        conversation_id: ConversationId,
        accept: bool,
    ) -> Result<(), ClientError> {
        if accept {
            self.api.accept_invitation(conversation_id).await?;
        } else {
            self.api.decline_invitation(conversation_id).await?;
        }
        self.cache.invalidate(&CacheKey::Conversations);
        Ok(())
    }

    pub async fn delete_message(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
    ) -> Result<(), ClientError> {
        self.api.delete_message(message_id).await?;
        self.cache.remove_message(conversation_id, message_id);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use chrono::Utc;

    use vanish_shared::api::*;
    use vanish_shared::records::{
        expiry_from, Conversation, ConversationPermissions, Message, Notification, Profile,
    };
    use vanish_shared::types::{ConversationId, InviteStatus, MessageId, UserId};

    use crate::api::ConversationApi;
    use crate::error::ClientError;

    pub fn profile(user_id: UserId) -> Profile {
        Profile {
            user_id,
            username: format!("user-{}", &user_id.to_string()[..8]),
            display_name: None,
            avatar_url: None,
            created_at: Utc::now(),
        }
    }

    /// Build the server's copy of a message from the request it received.
    pub fn server_message(sender: UserId, req: &SendMessageRequest) -> Message {
        let now = Utc::now();
        Message {
            id: MessageId::new(),
            conversation_id: req.conversation_id,
            sender_id: sender,
            content: req.content.clone(),
            kind: req.message_type,
            created_at: now,
            expires_at: expiry_from(now, req.expiration_hours),
            read_by: Default::default(),
            edited_at: None,
            reply_to: req.reply_to,
            screenshot_detected: false,
        }
    }

    /// Scripted API double: `send_message` pops queued results and records
    /// every request it saw; the read endpoints return queued pages.
    #[derive(Default)]
    pub struct MockApi {
        pub send_results: Mutex<VecDeque<Result<Message, ClientError>>>,
        pub sent: Mutex<Vec<SendMessageRequest>>,
        pub message_pages: Mutex<VecDeque<Vec<Message>>>,
    }

    impl MockApi {
        pub fn queue_send(&self, result: Result<Message, ClientError>) {
            self.send_results.lock().unwrap().push_back(result);
        }

        pub fn sent_requests(&self) -> Vec<SendMessageRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl ConversationApi for MockApi {
        async fn get_conversations(
            &self,
            _status: Option<InviteStatus>,
        ) -> Result<Vec<Conversation>, ClientError> {
            Ok(Vec::new())
        }

        async fn create_conversation(
            &self,
            _req: CreateConversationRequest,
        ) -> Result<Conversation, ClientError> {
            unimplemented!("not scripted")
        }

        async fn leave_conversation(
            &self,
            _conversation_id: ConversationId,
        ) -> Result<LeaveConversationResponse, ClientError> {
            Ok(LeaveConversationResponse {
                success: true,
                deleted: false,
            })
        }

        async fn accept_invitation(
            &self,
            _conversation_id: ConversationId,
        ) -> Result<(), ClientError> {
            Ok(())
        }

        async fn decline_invitation(
            &self,
            _conversation_id: ConversationId,
        ) -> Result<(), ClientError> {
            Ok(())
        }

        async fn get_user_permissions(
            &self,
            _conversation_id: ConversationId,
        ) -> Result<Option<ConversationPermissions>, ClientError> {
            Ok(None)
        }

        async fn get_messages(
            &self,
            _req: GetMessagesRequest,
        ) -> Result<Vec<Message>, ClientError> {
            Ok(self
                .message_pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default())
        }

        async fn send_message(&self, req: SendMessageRequest) -> Result<Message, ClientError> {
            self.sent.lock().unwrap().push(req);
            self.send_results
                .lock()
                .unwrap()
                .pop_front()
                .expect("unscripted send_message call")
        }

        async fn edit_message(&self, _req: EditMessageRequest) -> Result<Message, ClientError> {
            unimplemented!("not scripted")
        }

        async fn delete_message(&self, _message_id: MessageId) -> Result<(), ClientError> {
            Ok(())
        }

        async fn mark_read(&self, _message_id: MessageId) -> Result<Message, ClientError> {
            unimplemented!("not scripted")
        }

        async fn get_notifications(&self) -> Result<Vec<Notification>, ClientError> {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use vanish_shared::types::{ConversationId, MessageKind, UserId};

    use super::test_support::{profile, server_message, MockApi};
    use super::*;
    use crate::cache::QueryCache;
    use crate::notices;

    fn pipeline_with(api: MockApi) -> (MessagePipeline<MockApi>, Arc<QueryCache>, UserId) {
        let cache = Arc::new(QueryCache::new());
        let me = UserId::new();
        let (tx, _rx) = notices::channel();
        let pipeline = MessagePipeline::new(api, cache.clone(), profile(me), tx);
        (pipeline, cache, me)
    }

    #[tokio::test]
    async fn successful_send_confirms_in_place() {
        let api = MockApi::default();
        let conv = ConversationId::new();
        let (pipeline, cache, me) = pipeline_with(api);

        pipeline.api.queue_send(Ok(server_message(
            me,
            &vanish_shared::api::SendMessageRequest {
                conversation_id: conv,
                content: "hello".into(),
                message_type: MessageKind::Text,
                expiration_hours: None,
                reply_to: None,
            },
        )));

        let sent = pipeline
            .send_message(conv, "hello", MessageKind::Text, None, None)
            .await
            .unwrap();

        let records = cache.messages(conv);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message.id, sent.id);
        assert_eq!(records[0].state, DeliveryState::Confirmed);
    }

    #[tokio::test]
    async fn failed_send_is_retained_and_flagged() {
        let api = MockApi::default();
        api.queue_send(Err(ClientError::Api {
            status: 500,
            message: "boom".into(),
        }));
        let conv = ConversationId::new();
        let (pipeline, cache, _me) = pipeline_with(api);

        let err = pipeline
            .send_message(conv, "keep me", MessageKind::Text, None, None)
            .await;
        assert!(err.is_err());

        let records = cache.messages(conv);
        assert_eq!(records.len(), 1);
        assert!(records[0].is_failed());
        assert_eq!(records[0].message.content, "keep me");
    }

    #[tokio::test]
    async fn retry_resends_original_payload() {
        let api = MockApi::default();
        api.queue_send(Err(ClientError::Api {
            status: 500,
            message: "boom".into(),
        }));
        let conv = ConversationId::new();
        let (pipeline, cache, me) = pipeline_with(api);

        let _ = pipeline
            .send_message(conv, "second try", MessageKind::Text, None, None)
            .await;
        let failed_id = cache.messages(conv)[0].message.id;

        let original = pipeline.api.sent_requests()[0].clone();
        pipeline.api.queue_send(Ok(server_message(me, &original)));

        pipeline.retry_message(conv, failed_id).await.unwrap();

        let requests = pipeline.api.sent_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);

        // The retry invalidates the message slot; the next read refetches.
        assert!(cache.get(&CacheKey::Messages(conv)).is_none());
    }

    #[tokio::test]
    async fn retry_of_unknown_message_is_not_found() {
        let api = MockApi::default();
        let conv = ConversationId::new();
        let (pipeline, _cache, _me) = pipeline_with(api);

        let err = pipeline
            .retry_message(conv, vanish_shared::types::MessageId::new())
            .await;
        assert!(matches!(err, Err(ClientError::NotFound)));
    }

    #[tokio::test]
    async fn empty_content_never_reaches_the_wire() {
        let api = MockApi::default();
        let conv = ConversationId::new();
        let (pipeline, cache, _me) = pipeline_with(api);

        let err = pipeline
            .send_message(conv, "   ", MessageKind::Text, None, None)
            .await;
        assert!(matches!(err, Err(ClientError::Validation(_))));
        assert!(cache.messages(conv).is_empty());
        assert!(pipeline.api.sent_requests().is_empty());
    }
}
