//! CRUD operations for [`Message`] records.
//!
//! Expired messages are not purged here; expiry is a read-side concern of
//! the clients.  Deletion authorization (sender-or-admin) is expressed as
//! a guarded DELETE, mirroring a hosted database's row policy.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::params;

use vanish_shared::records::Message;
use vanish_shared::types::{ConversationId, MessageId, MessageKind, UserId};

use crate::convert::{enum_col, opt_ts_col, opt_uuid_col, ts_col, uuid_col};
use crate::database::Database;
use crate::error::{Result, StoreError};

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, content, kind, created_at, \
     expires_at, read_by, edited_at, reply_to, screenshot_detected";

impl Database {
    pub fn insert_message(&self, message: &Message) -> Result<()> {
        self.conn().execute(
            "INSERT INTO messages
                 (id, conversation_id, sender_id, content, kind, created_at,
                  expires_at, read_by, edited_at, reply_to, screenshot_detected)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                message.id.to_string(),
                message.conversation_id.to_string(),
                message.sender_id.to_string(),
                message.content,
                message.kind.as_str(),
                message.created_at.to_rfc3339(),
                message.expires_at.to_rfc3339(),
                serde_json::to_string(&message.read_by)?,
                message.edited_at.map(|t| t.to_rfc3339()),
                message.reply_to.map(|r| r.to_string()),
                message.screenshot_detected as i64,
            ],
        )?;
        Ok(())
    }

    /// Page through a conversation's messages, oldest first within the
    /// returned slice (offset pagination from the newest end).
    pub fn get_messages(
        &self,
        conversation_id: ConversationId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM (
                 SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at DESC
                 LIMIT ?2 OFFSET ?3
             )
             ORDER BY created_at ASC"
        ))?;

        let rows = stmt.query_map(
            params![conversation_id.to_string(), limit, offset],
            row_to_message,
        )?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn get_message(&self, id: MessageId) -> Result<Message> {
        self.conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id.to_string()],
                row_to_message,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Replace the content of a message and stamp `edited_at`.  The
    /// sender-only guard lives in the WHERE clause; callers additionally
    /// enforce the edit window.
    pub fn update_message_content(
        &self,
        id: MessageId,
        sender_id: UserId,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE messages SET content = ?3, edited_at = ?4
             WHERE id = ?1 AND sender_id = ?2",
            params![
                id.to_string(),
                sender_id.to_string(),
                content,
                edited_at.to_rfc3339()
            ],
        )?;
        Ok(affected > 0)
    }

    /// Delete a message on behalf of `user_id`, allowed when the user is
    /// the sender or an active admin of the parent conversation.  Returns
    /// the parent conversation id when a row was removed (the caller needs
    /// it to broadcast the deletion).
    pub fn delete_message_checked(
        &self,
        id: MessageId,
        user_id: UserId,
    ) -> Result<Option<ConversationId>> {
        let conversation_id = match self.get_message(id) {
            Ok(m) => m.conversation_id,
            Err(StoreError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };

        let affected = self.conn().execute(
            "DELETE FROM messages
             WHERE id = ?1
               AND (sender_id = ?2
                    OR EXISTS (
                        SELECT 1 FROM conversation_participants
                        WHERE conversation_id = messages.conversation_id
                          AND user_id = ?2 AND role = 'admin' AND left_at IS NULL))",
            params![id.to_string(), user_id.to_string()],
        )?;

        Ok((affected > 0).then_some(conversation_id))
    }

    /// Record a per-user read timestamp inside the `read_by` JSON map.
    pub fn mark_message_read(
        &self,
        id: MessageId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<Message> {
        let mut message = self.get_message(id)?;
        message.read_by.insert(user_id, at);

        self.conn().execute(
            "UPDATE messages SET read_by = ?2 WHERE id = ?1",
            params![id.to_string(), serde_json::to_string(&message.read_by)?],
        )?;
        Ok(message)
    }

    /// Flag a message as screenshotted.
    pub fn set_screenshot_flag(&self, id: MessageId) -> Result<Message> {
        self.conn().execute(
            "UPDATE messages SET screenshot_detected = 1 WHERE id = ?1",
            params![id.to_string()],
        )?;
        self.get_message(id)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let read_by_json: String = row.get(7)?;
    let read_by: BTreeMap<UserId, DateTime<Utc>> = serde_json::from_str(&read_by_json)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;

    let screenshot: i64 = row.get(10)?;

    Ok(Message {
        id: MessageId(uuid_col(row, 0)?),
        conversation_id: ConversationId(uuid_col(row, 1)?),
        sender_id: UserId(uuid_col(row, 2)?),
        content: row.get(3)?,
        kind: enum_col(row, 4, MessageKind::from_str)?,
        created_at: ts_col(row, 5)?,
        expires_at: ts_col(row, 6)?,
        read_by,
        edited_at: opt_ts_col(row, 8)?,
        reply_to: opt_uuid_col(row, 9)?.map(MessageId),
        screenshot_detected: screenshot != 0,
    })
}
