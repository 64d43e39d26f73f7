//! Follower-edge operations.

use chrono::Utc;
use rusqlite::params;

use vanish_shared::types::UserId;

use crate::convert::uuid_col;
use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Create a follower edge.  Idempotent.
    pub fn follow(&self, follower_id: UserId, followed_id: UserId) -> Result<bool> {
        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO followers (follower_id, followed_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![
                follower_id.to_string(),
                followed_id.to_string(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(affected > 0)
    }

    /// Remove a follower edge.
    pub fn unfollow(&self, follower_id: UserId, followed_id: UserId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM followers WHERE follower_id = ?1 AND followed_id = ?2",
            params![follower_id.to_string(), followed_id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Users following `user_id`.
    pub fn list_followers(&self, user_id: UserId) -> Result<Vec<UserId>> {
        let mut stmt = self.conn().prepare(
            "SELECT follower_id FROM followers WHERE followed_id = ?1 ORDER BY created_at ASC",
        )?;

        let rows = stmt.query_map(params![user_id.to_string()], |row| uuid_col(row, 0))?;

        let mut followers = Vec::new();
        for row in rows {
            followers.push(UserId(row?));
        }
        Ok(followers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::insert_profile;

    #[test]
    fn follow_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let a = insert_profile(&db, "a");
        let b = insert_profile(&db, "b");

        assert!(db.follow(a, b).unwrap());
        assert!(!db.follow(a, b).unwrap());
        assert_eq!(db.list_followers(b).unwrap(), vec![a]);

        assert!(db.unfollow(a, b).unwrap());
        assert!(db.list_followers(b).unwrap().is_empty());
    }
}
