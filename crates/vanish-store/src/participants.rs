//! CRUD operations for [`Participant`] rows.
//!
//! Participant rows are never physically deleted by user action; leaving a
//! conversation sets `left_at` and invitation responses flip
//! `invite_status`.  Only a conversation hard-delete removes them, by
//! cascade.

use chrono::{DateTime, Utc};
use rusqlite::params;

use vanish_shared::records::{ConversationPermissions, Participant};
use vanish_shared::types::{ConversationId, InviteStatus, ParticipantRole, UserId};

use crate::convert::{enum_col, opt_ts_col, ts_col, uuid_col};
use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    /// Insert a participant row (admin add).
    pub fn add_participant(&self, participant: &Participant) -> Result<()> {
        self.conn().execute(
            "INSERT INTO conversation_participants
                 (conversation_id, user_id, role, joined_at, left_at, invite_status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                participant.conversation_id.to_string(),
                participant.user_id.to_string(),
                participant.role.as_str(),
                participant.joined_at.to_rfc3339(),
                participant.left_at.map(|t| t.to_rfc3339()),
                participant.invite_status.as_str(),
            ],
        )?;
        Ok(())
    }

    /// Fetch one participant row.
    pub fn get_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> Result<Participant> {
        self.conn()
            .query_row(
                "SELECT conversation_id, user_id, role, joined_at, left_at, invite_status
                 FROM conversation_participants
                 WHERE conversation_id = ?1 AND user_id = ?2",
                params![conversation_id.to_string(), user_id.to_string()],
                row_to_participant,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List all participant rows for a conversation, with profiles joined
    /// in where one exists.
    pub fn list_participants(&self, conversation_id: ConversationId) -> Result<Vec<Participant>> {
        let mut stmt = self.conn().prepare(
            "SELECT p.conversation_id, p.user_id, p.role, p.joined_at, p.left_at,
                    p.invite_status,
                    pr.user_id, pr.username, pr.display_name, pr.avatar_url, pr.created_at
             FROM conversation_participants p
             LEFT JOIN profiles pr ON pr.user_id = p.user_id
             WHERE p.conversation_id = ?1
             ORDER BY p.joined_at ASC",
        )?;

        let rows = stmt.query_map(params![conversation_id.to_string()], |row| {
            let mut participant = row_to_participant(row)?;
            let profile_user: Option<String> = row.get(6)?;
            if profile_user.is_some() {
                participant.profile = Some(vanish_shared::records::Profile {
                    user_id: UserId(uuid_col(row, 6)?),
                    username: row.get(7)?,
                    display_name: row.get(8)?,
                    avatar_url: row.get(9)?,
                    created_at: ts_col(row, 10)?,
                });
            }
            Ok(participant)
        })?;

        let mut participants = Vec::new();
        for row in rows {
            participants.push(row?);
        }
        Ok(participants)
    }

    /// Set `left_at` on an active participant row.  Returns `true` if a
    /// row changed; a second leave is a no-op returning `false`.
    pub fn mark_left(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE conversation_participants SET left_at = ?3
             WHERE conversation_id = ?1 AND user_id = ?2 AND left_at IS NULL",
            params![
                conversation_id.to_string(),
                user_id.to_string(),
                at.to_rfc3339()
            ],
        )?;
        Ok(affected > 0)
    }

    /// Move an invitation out of `pending`.  The guard in the WHERE clause
    /// mirrors the row policy: a row not in `pending` is left untouched and
    /// the call reports zero rows affected.
    pub fn resolve_invite(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        status: InviteStatus,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE conversation_participants SET invite_status = ?3
             WHERE conversation_id = ?1 AND user_id = ?2
               AND invite_status = 'pending' AND left_at IS NULL",
            params![
                conversation_id.to_string(),
                user_id.to_string(),
                status.as_str()
            ],
        )?;
        Ok(affected > 0)
    }

    /// Permission summary for a user in a conversation, or `None` when the
    /// user has no participant row at all.
    pub fn get_permissions(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> Result<Option<ConversationPermissions>> {
        match self.get_participant(conversation_id, user_id) {
            Ok(p) => {
                let active = p.left_at.is_none() && p.invite_status == InviteStatus::Accepted;
                Ok(Some(ConversationPermissions {
                    is_participant: active,
                    is_admin: active && p.role == ParticipantRole::Admin,
                    role: Some(p.role),
                }))
            }
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn row_to_participant(row: &rusqlite::Row<'_>) -> rusqlite::Result<Participant> {
    Ok(Participant {
        conversation_id: ConversationId(uuid_col(row, 0)?),
        user_id: UserId(uuid_col(row, 1)?),
        role: enum_col(row, 2, ParticipantRole::from_str)?,
        joined_at: ts_col(row, 3)?,
        left_at: opt_ts_col(row, 4)?,
        invite_status: enum_col(row, 5, InviteStatus::from_str)?,
        profile: None,
    })
}
