//! Conversation lifecycle functions.
//!
//! These are plain functions over the database and the broadcast hub; the
//! HTTP layer in `api.rs` is a thin adapter.  Keeping them free of axum
//! types lets the lifecycle tests drive them directly.

use chrono::{Duration, Utc};
use tracing::info;

use vanish_shared::api::{CreateConversationRequest, LeaveConversationResponse};
use vanish_shared::events::RealtimeEvent;
use vanish_shared::records::{Conversation, Participant};
use vanish_shared::types::{
    ConversationId, ConversationKind, InviteStatus, ParticipantRole, UserId, CONVERSATIONS_TOPIC,
};
use vanish_shared::ValidationError;
use vanish_store::Database;

use crate::broadcast::Broadcaster;
use crate::error::ApiError;
use crate::notify;

/// Create a conversation with the caller as admin and every requested id as
/// a pending member.  Duplicates of the creator are excluded.  The
/// conversation row and all participant rows land in one transaction.
pub fn create_conversation(
    db: &mut Database,
    hub: &Broadcaster,
    creator: UserId,
    req: CreateConversationRequest,
) -> Result<Conversation, ApiError> {
    if req.created_by.is_some_and(|claimed| claimed != creator) {
        return Err(ApiError::Forbidden(
            "created_by does not match the bearer identity".into(),
        ));
    }

    let mut invitees: Vec<UserId> = Vec::new();
    for id in req.participant_ids {
        if id != creator && !invitees.contains(&id) {
            invitees.push(id);
        }
    }

    match req.kind {
        ConversationKind::Direct => {
            if invitees.len() != 1 {
                return Err(ValidationError::DirectParticipantCount.into());
            }
        }
        ConversationKind::Group => {
            if req.name.as_deref().map(str::trim).unwrap_or("").is_empty() {
                return Err(ValidationError::GroupNameMissing.into());
            }
            if invitees.is_empty() {
                return Err(ValidationError::GroupParticipantCount.into());
            }
        }
    }

    let now = Utc::now();
    let id = ConversationId::new();

    let mut participants = vec![Participant {
        conversation_id: id,
        user_id: creator,
        role: ParticipantRole::Admin,
        joined_at: now,
        left_at: None,
        invite_status: InviteStatus::Accepted,
        profile: None,
    }];
    for user_id in invitees {
        participants.push(Participant {
            conversation_id: id,
            user_id,
            role: ParticipantRole::Member,
            joined_at: now,
            left_at: None,
            invite_status: InviteStatus::Pending,
            profile: None,
        });
    }

    let conversation = Conversation {
        id,
        kind: req.kind,
        name: req.name.map(|n| n.trim().to_string()),
        created_by: creator,
        created_at: now,
        expires_at: req.expiration_hours.map(|h| now + Duration::hours(h)),
        last_activity_at: now,
        participants,
    };

    db.create_conversation(&conversation)?;

    notify::invitation_notifications(db, hub, &conversation)?;
    hub.publish(
        CONVERSATIONS_TOPIC,
        RealtimeEvent::ConversationChanged {
            conversation_id: id,
        },
    );

    info!(conversation = %id, kind = ?req.kind, "conversation created");

    db.get_conversation(id).map_err(ApiError::from)
}

/// List the caller's conversations for a participant status, newest
/// activity first.
pub fn list_conversations(
    db: &Database,
    user: UserId,
    status: Option<InviteStatus>,
) -> Result<Vec<Conversation>, ApiError> {
    let status = status.unwrap_or(InviteStatus::Accepted);
    db.list_conversations_for_user(user, status)
        .map_err(ApiError::from)
}

/// Leave a conversation.
///
/// Sets the caller's `left_at`, broadcasts `member_left`, then counts the
/// remaining active participants; a count of one or zero hard-deletes the
/// conversation (cascading to participants and messages) and broadcasts
/// `conversation_deleted`.  Leaving is therefore not idempotent in its
/// consequences: a later leave against a deleted conversation finds no row
/// to update and fails.
pub fn leave_conversation(
    db: &Database,
    hub: &Broadcaster,
    user: UserId,
    conversation_id: ConversationId,
) -> Result<LeaveConversationResponse, ApiError> {
    let left = db.mark_left(conversation_id, user, Utc::now())?;
    if !left {
        return Err(ApiError::NotFound(
            "not an active participant of this conversation".into(),
        ));
    }

    hub.publish(
        &conversation_id.lifecycle_topic(),
        RealtimeEvent::MemberLeft {
            conversation_id,
            user_id: user,
        },
    );

    let remaining = db.count_active_participants(conversation_id)?;
    let deleted = if remaining <= 1 {
        db.delete_conversation(conversation_id)?;
        hub.publish(
            &conversation_id.lifecycle_topic(),
            RealtimeEvent::ConversationDeleted { conversation_id },
        );
        info!(conversation = %conversation_id, "conversation deleted after last leave");
        true
    } else {
        false
    };

    hub.publish(
        CONVERSATIONS_TOPIC,
        RealtimeEvent::ConversationChanged { conversation_id },
    );

    Ok(LeaveConversationResponse {
        success: true,
        deleted,
    })
}

/// Respond to an invitation.  A row that is no longer `pending` is left
/// untouched and the call still reports success.
pub fn respond_to_invitation(
    db: &Database,
    hub: &Broadcaster,
    user: UserId,
    conversation_id: ConversationId,
    accept: bool,
) -> Result<(), ApiError> {
    let status = if accept {
        InviteStatus::Accepted
    } else {
        InviteStatus::Declined
    };

    let changed = db.resolve_invite(conversation_id, user, status)?;
    if changed {
        hub.publish(
            CONVERSATIONS_TOPIC,
            RealtimeEvent::ConversationChanged { conversation_id },
        );
        info!(conversation = %conversation_id, user = %user, ?status, "invitation resolved");
    }
    Ok(())
}
