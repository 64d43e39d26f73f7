//! Typed wrappers over the serverless endpoints.
//!
//! [`ConversationApi`] is the seam the pipeline and tests depend on;
//! [`HttpApi`] is the production implementation speaking JSON over
//! reqwest with a bearer token.

use serde::de::DeserializeOwned;
use serde::Serialize;

use vanish_shared::api::*;
use vanish_shared::records::{Conversation, ConversationPermissions, Message, Notification};
use vanish_shared::types::{ConversationId, InviteStatus, MessageId};

use crate::error::ClientError;

/// The endpoint surface the client core needs.  Implemented by
/// [`HttpApi`] in production and by scripted mocks in tests.
#[allow(async_fn_in_trait)]
pub trait ConversationApi {
    async fn get_conversations(
        &self,
        status: Option<InviteStatus>,
    ) -> Result<Vec<Conversation>, ClientError>;

    async fn create_conversation(
        &self,
        req: CreateConversationRequest,
    ) -> Result<Conversation, ClientError>;

    async fn leave_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<LeaveConversationResponse, ClientError>;

    async fn accept_invitation(&self, conversation_id: ConversationId)
        -> Result<(), ClientError>;

    async fn decline_invitation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<(), ClientError>;

    async fn get_user_permissions(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<ConversationPermissions>, ClientError>;

    async fn get_messages(&self, req: GetMessagesRequest) -> Result<Vec<Message>, ClientError>;

    async fn send_message(&self, req: SendMessageRequest) -> Result<Message, ClientError>;

    async fn edit_message(&self, req: EditMessageRequest) -> Result<Message, ClientError>;

    async fn delete_message(&self, message_id: MessageId) -> Result<(), ClientError>;

    async fn mark_read(&self, message_id: MessageId) -> Result<Message, ClientError>;

    async fn get_notifications(&self) -> Result<Vec<Notification>, ClientError>;
}

/// Production implementation over HTTP.
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    async fn call<Req, Resp>(&self, endpoint: &str, req: &Req) -> Result<Resp, ClientError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/fn/{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(req)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

impl ConversationApi for HttpApi {
    async fn get_conversations(
        &self,
        status: Option<InviteStatus>,
    ) -> Result<Vec<Conversation>, ClientError> {
        let resp: ConversationsResponse = self
            .call("get-conversations", &GetConversationsRequest { status })
            .await?;
        Ok(resp.conversations)
    }

    async fn create_conversation(
        &self,
        req: CreateConversationRequest,
    ) -> Result<Conversation, ClientError> {
        let resp: CreateConversationResponse = self.call("create-conversation", &req).await?;
        Ok(resp.conversation)
    }

    async fn leave_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<LeaveConversationResponse, ClientError> {
        self.call(
            "leave-conversation",
            &ConversationIdRequest { conversation_id },
        )
        .await
    }

    async fn accept_invitation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<(), ClientError> {
        let _: AckResponse = self
            .call("accept-invitation", &ConversationIdRequest { conversation_id })
            .await?;
        Ok(())
    }

    async fn decline_invitation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<(), ClientError> {
        let _: AckResponse = self
            .call(
                "decline-invitation",
                &ConversationIdRequest { conversation_id },
            )
            .await?;
        Ok(())
    }

    async fn get_user_permissions(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<ConversationPermissions>, ClientError> {
        let resp: PermissionsResponse = self
            .call(
                "get-user-permissions",
                &ConversationIdRequest { conversation_id },
            )
            .await?;
        Ok(resp.permissions)
    }

    async fn get_messages(&self, req: GetMessagesRequest) -> Result<Vec<Message>, ClientError> {
        let resp: MessagesResponse = self.call("get-messages", &req).await?;
        Ok(resp.messages)
    }

    async fn send_message(&self, req: SendMessageRequest) -> Result<Message, ClientError> {
        let resp: MessageResponse = self.call("send-message", &req).await?;
        Ok(resp.message)
    }

    async fn edit_message(&self, req: EditMessageRequest) -> Result<Message, ClientError> {
        let resp: MessageResponse = self.call("edit-message", &req).await?;
        Ok(resp.message)
    }

    async fn delete_message(&self, message_id: MessageId) -> Result<(), ClientError> {
        let _: AckResponse = self
            .call(
                "delete-message",
                &DeleteMessageRequest {
                    message_id,
                    user_id: None,
                },
            )
            .await?;
        Ok(())
    }

    async fn mark_read(&self, message_id: MessageId) -> Result<Message, ClientError> {
        let resp: MessageResponse = self.call("mark-read", &MessageIdRequest { message_id }).await?;
        Ok(resp.message)
    }

    async fn get_notifications(&self) -> Result<Vec<Notification>, ClientError> {
        let resp: NotificationsResponse = self
            .call("get-notifications", &serde_json::json!({}))
            .await?;
        Ok(resp.notifications)
    }
}
