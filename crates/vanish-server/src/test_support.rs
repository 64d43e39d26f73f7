//! Shared fixtures for the server-side function tests.

use vanish_shared::api::{CreateConversationRequest, RegisterRequest};
use vanish_shared::types::{ConversationId, ConversationKind, UserId};
use vanish_store::Database;

use crate::auth;
use crate::broadcast::Broadcaster;
use crate::conversations;

pub fn seeded_db() -> (Database, Broadcaster) {
    (Database::open_in_memory().unwrap(), Broadcaster::new())
}

pub fn register_user(db: &Database, username: &str) -> UserId {
    auth::register(
        db,
        RegisterRequest {
            username: username.into(),
            display_name: None,
        },
    )
    .unwrap()
    .user_id
}

/// Create a group conversation whose members have all accepted, returning
/// the conversation id and the users (creator first).
pub fn request_for_group(
    db: &mut Database,
    hub: &Broadcaster,
    usernames: &[&str],
) -> (ConversationId, Vec<UserId>) {
    let users: Vec<UserId> = usernames.iter().map(|u| register_user(db, u)).collect();
    let creator = users[0];

    let req = CreateConversationRequest {
        kind: ConversationKind::Group,
        name: Some("fixture".into()),
        expiration_hours: None,
        participant_ids: users[1..].to_vec(),
        created_by: None,
    };
    let conv = conversations::create_conversation(db, hub, creator, req).unwrap();

    for &user in &users[1..] {
        conversations::respond_to_invitation(db, hub, user, conv.id, true).unwrap();
    }

    (conv.id, users)
}
