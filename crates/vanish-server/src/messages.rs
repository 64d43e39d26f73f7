//! Message endpoints: fetch, send, edit, delete, read receipts, screenshot
//! flagging.
//!
//! Expired messages are never purged here; clients filter on `expires_at`.

use chrono::{Duration, Utc};
use tracing::info;

use vanish_shared::api::SendMessageRequest;
use vanish_shared::constants::EDIT_WINDOW_MINUTES;
use vanish_shared::events::RealtimeEvent;
use vanish_shared::records::{expiry_from, validate_content, Message};
use vanish_shared::types::{ConversationId, MessageId, UserId, CONVERSATIONS_TOPIC};
use vanish_store::Database;

use crate::broadcast::Broadcaster;
use crate::error::ApiError;
use crate::notify;

fn require_participant(
    db: &Database,
    conversation_id: ConversationId,
    user: UserId,
) -> Result<(), ApiError> {
    let is_participant = db
        .get_permissions(conversation_id, user)?
        .is_some_and(|p| p.is_participant);
    if !is_participant {
        return Err(ApiError::Forbidden(
            "not an active participant of this conversation".into(),
        ));
    }
    Ok(())
}

/// Page through a conversation's messages.  Participant-gated.
pub fn get_messages(
    db: &Database,
    user: UserId,
    conversation_id: ConversationId,
    limit: u32,
    offset: u32,
) -> Result<Vec<Message>, ApiError> {
    require_participant(db, conversation_id, user)?;
    db.get_messages(conversation_id, limit, offset)
        .map_err(ApiError::from)
}

/// Persist a message, bump conversation activity, broadcast `new_message`,
/// and fan out notifications to the other participants.
pub fn send_message(
    db: &Database,
    hub: &Broadcaster,
    sender: UserId,
    req: SendMessageRequest,
) -> Result<Message, ApiError> {
    let content = validate_content(&req.content)?;
    require_participant(db, req.conversation_id, sender)?;

    let now = Utc::now();
    let message = Message {
        id: MessageId::new(),
        conversation_id: req.conversation_id,
        sender_id: sender,
        content,
        kind: req.message_type,
        created_at: now,
        expires_at: expiry_from(now, req.expiration_hours),
        read_by: Default::default(),
        edited_at: None,
        reply_to: req.reply_to,
        screenshot_detected: false,
    };

    db.insert_message(&message)?;
    db.touch_last_activity(req.conversation_id, now)?;

    hub.publish(
        &req.conversation_id.message_topic(),
        RealtimeEvent::NewMessage {
            message: message.clone(),
        },
    );
    hub.publish(
        CONVERSATIONS_TOPIC,
        RealtimeEvent::ConversationChanged {
            conversation_id: req.conversation_id,
        },
    );
    notify::message_notifications(db, hub, &message)?;

    info!(message = %message.id, conversation = %req.conversation_id, "message sent");
    Ok(message)
}

/// Edit a message within the 15-minute window.  Sender only.
pub fn edit_message(
    db: &Database,
    hub: &Broadcaster,
    user: UserId,
    message_id: MessageId,
    content: &str,
) -> Result<Message, ApiError> {
    let content = validate_content(content)?;
    let existing = db.get_message(message_id)?;

    if existing.sender_id != user {
        return Err(ApiError::Forbidden("only the sender may edit".into()));
    }

    let now = Utc::now();
    if now - existing.created_at > Duration::minutes(EDIT_WINDOW_MINUTES) {
        return Err(ApiError::Forbidden("edit window has closed".into()));
    }

    db.update_message_content(message_id, user, &content, now)?;
    let updated = db.get_message(message_id)?;

    hub.publish(
        &updated.conversation_id.message_topic(),
        RealtimeEvent::MessageUpdated {
            message: updated.clone(),
        },
    );
    Ok(updated)
}

/// Delete a message and broadcast the deletion.  Authorization (sender or
/// conversation admin) is enforced by the guarded DELETE in the store.
pub fn delete_message(
    db: &Database,
    hub: &Broadcaster,
    user: UserId,
    message_id: MessageId,
    claimed_user: Option<UserId>,
) -> Result<(), ApiError> {
    if claimed_user.is_some_and(|claimed| claimed != user) {
        return Err(ApiError::Forbidden(
            "user_id does not match the bearer identity".into(),
        ));
    }

    match db.delete_message_checked(message_id, user)? {
        Some(conversation_id) => {
            hub.publish(
                &conversation_id.message_topic(),
                RealtimeEvent::MessageDeleted {
                    conversation_id,
                    message_id,
                },
            );
            info!(message = %message_id, conversation = %conversation_id, "message deleted");
            Ok(())
        }
        None => Err(ApiError::NotFound(
            "message not found or not deletable".into(),
        )),
    }
}

/// Record a read receipt and broadcast the updated record.
pub fn mark_read(
    db: &Database,
    hub: &Broadcaster,
    user: UserId,
    message_id: MessageId,
) -> Result<Message, ApiError> {
    let existing = db.get_message(message_id)?;
    require_participant(db, existing.conversation_id, user)?;

    let updated = db.mark_message_read(message_id, user, Utc::now())?;
    hub.publish(
        &updated.conversation_id.message_topic(),
        RealtimeEvent::MessageUpdated {
            message: updated.clone(),
        },
    );
    Ok(updated)
}

/// Flag a message as screenshotted and broadcast the updated record.
pub fn flag_screenshot(
    db: &Database,
    hub: &Broadcaster,
    user: UserId,
    message_id: MessageId,
) -> Result<Message, ApiError> {
    let existing = db.get_message(message_id)?;
    require_participant(db, existing.conversation_id, user)?;

    let updated = db.set_screenshot_flag(message_id)?;
    hub.publish(
        &updated.conversation_id.message_topic(),
        RealtimeEvent::MessageUpdated {
            message: updated.clone(),
        },
    );
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{register_user, request_for_group, seeded_db};
    use vanish_shared::types::{MessageKind, NotificationKind};

    fn send_req(conversation_id: ConversationId, content: &str) -> SendMessageRequest {
        SendMessageRequest {
            conversation_id,
            content: content.into(),
            message_type: MessageKind::Text,
            expiration_hours: None,
            reply_to: None,
        }
    }

    #[test]
    fn send_requires_active_participant() {
        let (mut db, hub) = seeded_db();
        let (conv, _) = request_for_group(&mut db, &hub, &["a", "b"]);
        let outsider = register_user(&db, "x");

        assert!(matches!(
            send_message(&db, &hub, outsider, send_req(conv, "hi")),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn send_rejects_blank_content() {
        let (mut db, hub) = seeded_db();
        let (conv, users) = request_for_group(&mut db, &hub, &["a", "b"]);

        assert!(matches!(
            send_message(&db, &hub, users[0], send_req(conv, "   ")),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn send_broadcasts_and_notifies() {
        let (mut db, hub) = seeded_db();
        let (conv, users) = request_for_group(&mut db, &hub, &["a", "b"]);

        let mut rx = hub.subscribe(&conv.message_topic());
        let message = send_message(&db, &hub, users[0], send_req(conv, " hello ")).unwrap();
        assert_eq!(message.content, "hello");

        match rx.try_recv().unwrap() {
            RealtimeEvent::NewMessage { message: m } => assert_eq!(m.id, message.id),
            other => panic!("unexpected event: {other:?}"),
        }
        // The fixture already delivered invitation notifications; only the
        // message-kind one comes from this send.
        let message_notices = db
            .list_notifications(users[1])
            .unwrap()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::Message)
            .count();
        assert_eq!(message_notices, 1);

        let conversation = db.get_conversation(conv).unwrap();
        assert_eq!(conversation.last_activity_at, message.created_at);
    }

    #[test]
    fn edit_window_is_enforced() {
        let (mut db, hub) = seeded_db();
        let (conv, users) = request_for_group(&mut db, &hub, &["a", "b"]);
        let message = send_message(&db, &hub, users[0], send_req(conv, "typo")).unwrap();

        // Inside the window, by the sender: fine.
        let updated = edit_message(&db, &hub, users[0], message.id, "fixed").unwrap();
        assert_eq!(updated.content, "fixed");
        assert!(updated.edited_at.is_some());

        // Not the sender.
        assert!(matches!(
            edit_message(&db, &hub, users[1], message.id, "nope"),
            Err(ApiError::Forbidden(_))
        ));

        // Outside the window: insert a message that is already too old.
        let stale_created = Utc::now() - Duration::minutes(EDIT_WINDOW_MINUTES + 1);
        let stale = Message {
            id: MessageId::new(),
            conversation_id: conv,
            sender_id: users[0],
            content: "old".into(),
            kind: MessageKind::Text,
            created_at: stale_created,
            expires_at: expiry_from(stale_created, None),
            read_by: Default::default(),
            edited_at: None,
            reply_to: None,
            screenshot_detected: false,
        };
        db.insert_message(&stale).unwrap();
        assert!(matches!(
            edit_message(&db, &hub, users[0], stale.id, "late"),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn delete_broadcasts_deletion() {
        let (mut db, hub) = seeded_db();
        let (conv, users) = request_for_group(&mut db, &hub, &["a", "b"]);
        let message = send_message(&db, &hub, users[0], send_req(conv, "bye")).unwrap();

        let mut rx = hub.subscribe(&conv.message_topic());
        delete_message(&db, &hub, users[0], message.id, Some(users[0])).unwrap();

        assert!(matches!(
            rx.try_recv().unwrap(),
            RealtimeEvent::MessageDeleted { .. }
        ));
        assert!(matches!(
            delete_message(&db, &hub, users[0], message.id, None),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn read_receipt_round_trip() {
        let (mut db, hub) = seeded_db();
        let (conv, users) = request_for_group(&mut db, &hub, &["a", "b"]);
        let message = send_message(&db, &hub, users[0], send_req(conv, "hi")).unwrap();

        let updated = mark_read(&db, &hub, users[1], message.id).unwrap();
        assert!(updated.read_by.contains_key(&users[1]));
    }
}
