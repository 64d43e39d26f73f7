//! Typed records exchanged between the API server, the store, and the
//! client cache.  Every struct derives `Serialize` and `Deserialize` so it
//! can travel over the HTTP and realtime surfaces unchanged.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_EXPIRATION_HOURS;
use crate::error::ValidationError;
use crate::types::{
    ConversationId, ConversationKind, InviteStatus, MessageId, MessageKind, NotificationId,
    NotificationKind, ParticipantRole, UserId,
};

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Public profile of a user, as stored in the `profiles` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub user_id: UserId,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// A direct or group conversation, with its participant rows embedded.
///
/// Invariants: a `direct` conversation has exactly two participants; a
/// `group` conversation has a name and two or more.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    pub kind: ConversationKind,
    /// Display name; group conversations only.
    pub name: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    /// Optional whole-conversation expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Bumped on every message send; drives conversation-list ordering.
    pub last_activity_at: DateTime<Utc>,
    pub participants: Vec<Participant>,
}

impl Conversation {
    /// Participants that have not left, regardless of invitation status.
    pub fn active_participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| p.left_at.is_none())
    }
}

/// Link between a user and a conversation.  Never physically deleted:
/// leaving sets `left_at` rather than removing the row, preserving history
/// for permission checks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub role: ParticipantRole,
    pub joined_at: DateTime<Utc>,
    /// One-way null -> timestamp transition, independent of invite status.
    pub left_at: Option<DateTime<Utc>>,
    pub invite_status: InviteStatus,
    /// Embedded profile when the read path joins against `profiles`.
    pub profile: Option<Profile>,
}

/// Permission summary for one user in one conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationPermissions {
    pub is_participant: bool,
    pub is_admin: bool,
    pub role: Option<ParticipantRole>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single conversation message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
    /// `created_at + expiration_hours`.  The server never purges expired
    /// rows; expiry is enforced by read-side filtering.
    pub expires_at: DateTime<Utc>,
    /// Per-user read receipts.
    pub read_by: BTreeMap<UserId, DateTime<Utc>>,
    pub edited_at: Option<DateTime<Utc>>,
    pub reply_to: Option<MessageId>,
    /// Set when a participant's device reported a screenshot.
    pub screenshot_detected: bool,
}

impl Message {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Compute a message expiry from its creation time and an optional
/// sender-chosen hour count.
pub fn expiry_from(created_at: DateTime<Utc>, expiration_hours: Option<i64>) -> DateTime<Utc> {
    created_at + Duration::hours(expiration_hours.unwrap_or(DEFAULT_EXPIRATION_HOURS))
}

/// Validate user-entered message content, returning the trimmed form.
pub fn validate_content(content: &str) -> Result<String, ValidationError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    Ok(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// An in-app notification row, created by server-side reactions to domain
/// events and owned (read/deleted) by the recipient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub read: bool,
    /// Opaque event payload, interpreted by the UI per `kind`.
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Posts / comments / followers
// ---------------------------------------------------------------------------

/// An ephemeral post on a user's feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: uuid::Uuid,
    pub author_id: UserId,
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Post {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// A comment on a post; `parent_comment_id` makes threads nestable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: uuid::Uuid,
    pub post_id: uuid::Uuid,
    pub author_id: UserId,
    pub parent_comment_id: Option<uuid::Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_defaults_to_24h() {
        let created = Utc::now();
        assert_eq!(expiry_from(created, None), created + Duration::hours(24));
        assert_eq!(expiry_from(created, Some(2)), created + Duration::hours(2));
    }

    #[test]
    fn active_participants_excludes_left_rows() {
        let id = ConversationId::new();
        let now = Utc::now();
        let member = |user_id, left_at| Participant {
            conversation_id: id,
            user_id,
            role: ParticipantRole::Member,
            joined_at: now,
            left_at,
            invite_status: InviteStatus::Accepted,
            profile: None,
        };

        let staying = UserId::new();
        let conversation = Conversation {
            id,
            kind: ConversationKind::Group,
            name: Some("g".into()),
            created_by: staying,
            created_at: now,
            expires_at: None,
            last_activity_at: now,
            participants: vec![member(staying, None), member(UserId::new(), Some(now))],
        };

        let active: Vec<_> = conversation.active_participants().collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].user_id, staying);
    }

    #[test]
    fn content_is_trimmed() {
        assert_eq!(validate_content("  hi  ").unwrap(), "hi");
        assert_eq!(
            validate_content("   "),
            Err(ValidationError::EmptyContent)
        );
    }

    #[test]
    fn message_expiry_is_exclusive_of_the_instant() {
        let now = Utc::now();
        let msg = Message {
            id: MessageId::new(),
            conversation_id: ConversationId::new(),
            sender_id: UserId::new(),
            content: "x".into(),
            kind: MessageKind::Text,
            created_at: now,
            expires_at: now,
            read_by: BTreeMap::new(),
            edited_at: None,
            reply_to: None,
            screenshot_detected: false,
        };
        assert!(!msg.is_expired(now));
        assert!(msg.is_expired(now + Duration::seconds(1)));
    }
}
