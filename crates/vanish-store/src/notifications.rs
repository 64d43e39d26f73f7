//! CRUD operations for [`Notification`] rows.

use chrono::Utc;
use rusqlite::params;

use vanish_shared::records::Notification;
use vanish_shared::types::{NotificationId, NotificationKind, UserId};

use crate::convert::{enum_col, opt_ts_col, ts_col, uuid_col};
use crate::database::Database;
use crate::error::Result;

impl Database {
    pub fn insert_notification(&self, notification: &Notification) -> Result<()> {
        self.conn().execute(
            "INSERT INTO notifications
                 (id, user_id, kind, title, body, read, payload, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                notification.id.0.to_string(),
                notification.user_id.to_string(),
                notification.kind.as_str(),
                notification.title,
                notification.body,
                notification.read as i64,
                serde_json::to_string(&notification.payload)?,
                notification.created_at.to_rfc3339(),
                notification.expires_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// List a user's notifications, newest first, excluding expired ones.
    pub fn list_notifications(&self, user_id: UserId) -> Result<Vec<Notification>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, kind, title, body, read, payload, created_at, expires_at
             FROM notifications
             WHERE user_id = ?1 AND (expires_at IS NULL OR expires_at > ?2)
             ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map(
            params![user_id.to_string(), Utc::now().to_rfc3339()],
            row_to_notification,
        )?;

        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?);
        }
        Ok(notifications)
    }

    /// Flip the read flag.  Scoped to the owning user.
    pub fn mark_notification_read(&self, id: NotificationId, user_id: UserId) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
            params![id.0.to_string(), user_id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Delete a notification.  Scoped to the owning user.
    pub fn delete_notification(&self, id: NotificationId, user_id: UserId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2",
            params![id.0.to_string(), user_id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let read: i64 = row.get(5)?;
    let payload_json: String = row.get(6)?;
    let payload = serde_json::from_str(&payload_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Notification {
        id: NotificationId(uuid_col(row, 0)?),
        user_id: UserId(uuid_col(row, 1)?),
        kind: enum_col(row, 2, NotificationKind::from_str)?,
        title: row.get(3)?,
        body: row.get(4)?,
        read: read != 0,
        payload,
        created_at: ts_col(row, 7)?,
        expires_at: opt_ts_col(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::insert_profile;
    use chrono::Duration;

    fn notification(user_id: UserId) -> Notification {
        Notification {
            id: NotificationId::new(),
            user_id,
            kind: NotificationKind::Message,
            title: "New message".into(),
            body: "ada: hi".into(),
            read: false,
            payload: serde_json::json!({"conversation_id": "x"}),
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    #[test]
    fn list_excludes_expired() {
        let db = Database::open_in_memory().unwrap();
        let user = insert_profile(&db, "a");

        let live = notification(user);
        let mut expired = notification(user);
        expired.expires_at = Some(Utc::now() - Duration::hours(1));
        db.insert_notification(&live).unwrap();
        db.insert_notification(&expired).unwrap();

        let list = db.list_notifications(user).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, live.id);
    }

    #[test]
    fn read_and_delete_are_owner_scoped() {
        let db = Database::open_in_memory().unwrap();
        let owner = insert_profile(&db, "a");
        let other = insert_profile(&db, "b");

        let n = notification(owner);
        db.insert_notification(&n).unwrap();

        assert!(!db.mark_notification_read(n.id, other).unwrap());
        assert!(db.mark_notification_read(n.id, owner).unwrap());
        assert!(db.list_notifications(owner).unwrap()[0].read);

        assert!(!db.delete_notification(n.id, other).unwrap());
        assert!(db.delete_notification(n.id, owner).unwrap());
    }
}
