//! Realtime events broadcast on conversation and user channels.
//!
//! Channel naming:
//! - `messages:<conversation_id>` carries message-level events
//! - `conversations:<conversation_id>` carries lifecycle events
//! - `conversations` (global) carries change-data-capture style updates
//!   for the conversation list
//! - `notifications-<user_id>` carries notification row inserts

use serde::{Deserialize, Serialize};

use crate::records::{Message, Notification};
use crate::types::{ConversationId, MessageId, UserId};

/// All events delivered over the realtime transport.
///
/// No sequence numbers are attached; consumers merge by message id (and by
/// pending-sender heuristics for optimistic sends), so delivery is
/// eventually consistent rather than ordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    NewMessage {
        message: Message,
    },
    MessageUpdated {
        message: Message,
    },
    MessageDeleted {
        conversation_id: ConversationId,
        message_id: MessageId,
    },
    MemberLeft {
        conversation_id: ConversationId,
        user_id: UserId,
    },
    ConversationDeleted {
        conversation_id: ConversationId,
    },
    /// Coarse change marker on the global `conversations` channel; the
    /// consumer refetches rather than patching.
    ConversationChanged {
        conversation_id: ConversationId,
    },
    NotificationCreated {
        notification: Notification,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_snake_case_tag() {
        let ev = RealtimeEvent::ConversationDeleted {
            conversation_id: ConversationId::new(),
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"type\":\"conversation_deleted\""));

        let back: RealtimeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ev);
    }
}
