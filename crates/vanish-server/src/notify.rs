//! Notification fan-out for domain events.
//!
//! Mirrors the trigger-invoked `notify` function of the hosted backend:
//! inserts in-app notification rows and publishes change events on the
//! per-user notification channels.

use chrono::Utc;

use vanish_shared::events::RealtimeEvent;
use vanish_shared::records::{Conversation, Message, Notification};
use vanish_shared::types::{InviteStatus, NotificationId, NotificationKind, UserId};
use vanish_store::{Database, StoreError};

use crate::broadcast::Broadcaster;

fn deliver(db: &Database, hub: &Broadcaster, notification: Notification) -> Result<(), StoreError> {
    db.insert_notification(&notification)?;
    hub.publish(
        &notification.user_id.notification_topic(),
        RealtimeEvent::NotificationCreated { notification },
    );
    Ok(())
}

fn sender_name(db: &Database, user_id: UserId) -> String {
    match db.get_profile(user_id) {
        Ok(profile) => profile.display_name.unwrap_or(profile.username),
        Err(_) => "Someone".to_string(),
    }
}

/// Notify every other active, accepted participant about a new message.
/// The notification inherits the message expiry so it disappears with it.
pub fn message_notifications(
    db: &Database,
    hub: &Broadcaster,
    message: &Message,
) -> Result<(), StoreError> {
    let sender = sender_name(db, message.sender_id);

    for p in db.list_participants(message.conversation_id)? {
        if p.user_id == message.sender_id
            || p.left_at.is_some()
            || p.invite_status != InviteStatus::Accepted
        {
            continue;
        }

        deliver(
            db,
            hub,
            Notification {
                id: NotificationId::new(),
                user_id: p.user_id,
                kind: NotificationKind::Message,
                title: "New message".into(),
                body: format!("{sender} sent you a message"),
                read: false,
                payload: serde_json::json!({
                    "conversation_id": message.conversation_id,
                    "message_id": message.id,
                }),
                created_at: Utc::now(),
                expires_at: Some(message.expires_at),
            },
        )?;
    }
    Ok(())
}

/// Notify every pending invitee of a freshly created conversation.
pub fn invitation_notifications(
    db: &Database,
    hub: &Broadcaster,
    conversation: &Conversation,
) -> Result<(), StoreError> {
    let inviter = sender_name(db, conversation.created_by);
    let name = conversation.name.clone().unwrap_or_else(|| "a conversation".into());

    for p in &conversation.participants {
        if p.invite_status != InviteStatus::Pending {
            continue;
        }

        deliver(
            db,
            hub,
            Notification {
                id: NotificationId::new(),
                user_id: p.user_id,
                kind: NotificationKind::Invitation,
                title: "Conversation invitation".into(),
                body: format!("{inviter} invited you to {name}"),
                read: false,
                payload: serde_json::json!({ "conversation_id": conversation.id }),
                created_at: Utc::now(),
                expires_at: conversation.expires_at,
            },
        )?;
    }
    Ok(())
}

/// Notify a user that someone started following them.
pub fn follow_notification(
    db: &Database,
    hub: &Broadcaster,
    follower: UserId,
    followed: UserId,
) -> Result<(), StoreError> {
    let name = sender_name(db, follower);
    deliver(
        db,
        hub,
        Notification {
            id: NotificationId::new(),
            user_id: followed,
            kind: NotificationKind::FriendRequest,
            title: "New follower".into(),
            body: format!("{name} started following you"),
            read: false,
            payload: serde_json::json!({ "follower_id": follower }),
            created_at: Utc::now(),
            expires_at: None,
        },
    )?;
    Ok(())
}
