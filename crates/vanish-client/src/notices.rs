//! Transient user-facing notices.
//!
//! The realtime listener emits these when something happens that the UI
//! should surface as a toast rather than (or in addition to) a cache
//! change.  Delivered over an unbounded mpsc channel; the UI drains it.

use tokio::sync::mpsc;

use vanish_shared::records::Notification;
use vanish_shared::types::{ConversationId, UserId};

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// A participant left a conversation we are in.
    MemberLeft {
        conversation_id: ConversationId,
        user_id: UserId,
    },
    /// A conversation we were viewing was deleted.
    ConversationDeleted { conversation_id: ConversationId },
    /// A server-side notification arrived over realtime.
    Notification(Notification),
    /// A message send failed; the record is kept for retry.
    SendFailed { conversation_id: ConversationId },
}

pub fn channel() -> (mpsc::UnboundedSender<Notice>, mpsc::UnboundedReceiver<Notice>) {
    mpsc::unbounded_channel()
}
