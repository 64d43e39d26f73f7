//! Shared fixtures for the store tests.

use chrono::Utc;

use vanish_shared::records::{Conversation, Participant, Profile};
use vanish_shared::types::{
    ConversationId, ConversationKind, InviteStatus, ParticipantRole, UserId,
};

use crate::database::Database;

pub fn insert_profile(db: &Database, username: &str) -> UserId {
    let user = UserId::new();
    db.upsert_profile(&Profile {
        user_id: user,
        username: username.into(),
        display_name: None,
        avatar_url: None,
        created_at: Utc::now(),
    })
    .unwrap();
    user
}

pub fn participant(
    conversation_id: ConversationId,
    user_id: UserId,
    role: ParticipantRole,
    invite_status: InviteStatus,
) -> Participant {
    Participant {
        conversation_id,
        user_id,
        role,
        joined_at: Utc::now(),
        left_at: None,
        invite_status,
        profile: None,
    }
}

/// Build a group conversation record with the creator as accepted admin and
/// the remaining users as accepted members.
pub fn group_conversation(creator: UserId, members: &[UserId]) -> Conversation {
    let id = ConversationId::new();
    let now = Utc::now();

    let mut participants = vec![participant(
        id,
        creator,
        ParticipantRole::Admin,
        InviteStatus::Accepted,
    )];
    for &m in members {
        participants.push(participant(
            id,
            m,
            ParticipantRole::Member,
            InviteStatus::Accepted,
        ));
    }

    Conversation {
        id,
        kind: ConversationKind::Group,
        name: Some("test group".into()),
        created_by: creator,
        created_at: now,
        expires_at: None,
        last_activity_at: now,
        participants,
    }
}
