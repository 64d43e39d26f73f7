//! CRUD operations for [`Conversation`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use vanish_shared::records::Conversation;
use vanish_shared::types::{ConversationId, ConversationKind, InviteStatus, UserId};

use crate::convert::{enum_col, opt_ts_col, ts_col, uuid_col};
use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a conversation together with all of its participant rows in a
    /// single transaction.  Either everything lands or nothing does; a
    /// failed participant insert rolls the conversation row back too.
    pub fn create_conversation(&mut self, conversation: &Conversation) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        tx.execute(
            "INSERT INTO conversations
                 (id, kind, name, created_by, created_at, expires_at, last_activity_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                conversation.id.to_string(),
                conversation.kind.as_str(),
                conversation.name,
                conversation.created_by.to_string(),
                conversation.created_at.to_rfc3339(),
                conversation.expires_at.map(|t| t.to_rfc3339()),
                conversation.last_activity_at.to_rfc3339(),
            ],
        )?;

        for p in &conversation.participants {
            tx.execute(
                "INSERT INTO conversation_participants
                     (conversation_id, user_id, role, joined_at, left_at, invite_status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    conversation.id.to_string(),
                    p.user_id.to_string(),
                    p.role.as_str(),
                    p.joined_at.to_rfc3339(),
                    p.left_at.map(|t| t.to_rfc3339()),
                    p.invite_status.as_str(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single conversation with its participants (and their
    /// profiles) embedded.
    pub fn get_conversation(&self, id: ConversationId) -> Result<Conversation> {
        let mut conversation = self
            .conn()
            .query_row(
                "SELECT id, kind, name, created_by, created_at, expires_at, last_activity_at
                 FROM conversations WHERE id = ?1",
                params![id.to_string()],
                row_to_conversation,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })?;

        conversation.participants = self.list_participants(id)?;
        Ok(conversation)
    }

    /// First step of the conversation-list read: the ids of conversations
    /// where the user is an active (non-left) participant with the given
    /// invitation status.
    pub fn conversation_ids_for_user(
        &self,
        user_id: UserId,
        status: InviteStatus,
    ) -> Result<Vec<ConversationId>> {
        let mut stmt = self.conn().prepare(
            "SELECT conversation_id FROM conversation_participants
             WHERE user_id = ?1 AND invite_status = ?2 AND left_at IS NULL",
        )?;

        let rows = stmt.query_map(params![user_id.to_string(), status.as_str()], |row| {
            uuid_col(row, 0)
        })?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(ConversationId(row?));
        }
        Ok(ids)
    }

    /// Second step: full conversation + participant + profile data for
    /// exactly the resolved ids, ordered by last activity descending.
    pub fn list_conversations_for_user(
        &self,
        user_id: UserId,
        status: InviteStatus,
    ) -> Result<Vec<Conversation>> {
        let ids = self.conversation_ids_for_user(user_id, status)?;

        let mut conversations = Vec::with_capacity(ids.len());
        for id in ids {
            conversations.push(self.get_conversation(id)?);
        }

        conversations.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        Ok(conversations)
    }

    /// Count participants that have not left, regardless of invitation
    /// status.
    pub fn count_active_participants(&self, id: ConversationId) -> Result<u32> {
        let count: u32 = self.conn().query_row(
            "SELECT COUNT(*) FROM conversation_participants
             WHERE conversation_id = ?1 AND left_at IS NULL",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Update / delete
    // ------------------------------------------------------------------

    /// Bump the last-activity timestamp (called on every message send).
    pub fn touch_last_activity(&self, id: ConversationId, at: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "UPDATE conversations SET last_activity_at = ?2 WHERE id = ?1",
            params![id.to_string(), at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Hard-delete a conversation.  Participants and messages cascade.
    /// Returns `true` if a row was deleted.
    pub fn delete_conversation(&self, id: ConversationId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM conversations WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: ConversationId(uuid_col(row, 0)?),
        kind: enum_col(row, 1, ConversationKind::from_str)?,
        name: row.get(2)?,
        created_by: UserId(uuid_col(row, 3)?),
        created_at: ts_col(row, 4)?,
        expires_at: opt_ts_col(row, 5)?,
        last_activity_at: ts_col(row, 6)?,
        participants: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{group_conversation, insert_profile, participant};
    use vanish_shared::types::ParticipantRole;

    #[test]
    fn create_and_get_round_trip() {
        let mut db = Database::open_in_memory().unwrap();
        let a = insert_profile(&db, "a");
        let b = insert_profile(&db, "b");

        let conv = group_conversation(a, &[b]);
        db.create_conversation(&conv).unwrap();

        let loaded = db.get_conversation(conv.id).unwrap();
        assert_eq!(loaded.id, conv.id);
        assert_eq!(loaded.participants.len(), 2);
        assert!(loaded
            .participants
            .iter()
            .any(|p| p.user_id == a && p.role == ParticipantRole::Admin));
    }

    #[test]
    fn create_is_atomic_on_participant_failure() {
        let mut db = Database::open_in_memory().unwrap();
        let a = insert_profile(&db, "a");
        let b = insert_profile(&db, "b");

        let mut conv = group_conversation(a, &[b]);
        // Duplicate participant row violates the composite primary key.
        let dup = participant(
            conv.id,
            b,
            ParticipantRole::Member,
            vanish_shared::types::InviteStatus::Accepted,
        );
        conv.participants.push(dup);

        assert!(db.create_conversation(&conv).is_err());
        // The conversation row must have rolled back with it.
        assert!(matches!(
            db.get_conversation(conv.id),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn list_is_ordered_by_last_activity() {
        let mut db = Database::open_in_memory().unwrap();
        let a = insert_profile(&db, "a");
        let b = insert_profile(&db, "b");

        let older = group_conversation(a, &[b]);
        let newer = group_conversation(a, &[b]);
        db.create_conversation(&older).unwrap();
        db.create_conversation(&newer).unwrap();

        db.touch_last_activity(newer.id, Utc::now() + chrono::Duration::seconds(5))
            .unwrap();

        let list = db
            .list_conversations_for_user(a, InviteStatus::Accepted)
            .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, newer.id);
    }

    #[test]
    fn pending_invitations_are_listed_separately() {
        let mut db = Database::open_in_memory().unwrap();
        let a = insert_profile(&db, "a");
        let b = insert_profile(&db, "b");

        let mut conv = group_conversation(a, &[]);
        conv.participants.push(participant(
            conv.id,
            b,
            ParticipantRole::Member,
            InviteStatus::Pending,
        ));
        db.create_conversation(&conv).unwrap();

        assert!(db
            .list_conversations_for_user(b, InviteStatus::Accepted)
            .unwrap()
            .is_empty());
        assert_eq!(
            db.list_conversations_for_user(b, InviteStatus::Pending)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn delete_cascades_to_participants() {
        let mut db = Database::open_in_memory().unwrap();
        let a = insert_profile(&db, "a");
        let b = insert_profile(&db, "b");

        let conv = group_conversation(a, &[b]);
        db.create_conversation(&conv).unwrap();

        assert!(db.delete_conversation(conv.id).unwrap());
        assert_eq!(db.count_active_participants(conv.id).unwrap(), 0);
        assert!(!db.delete_conversation(conv.id).unwrap());
    }
}
