//! CRUD operations for ephemeral [`Post`] records.
//!
//! Like messages, posts carry an `expires_at` that is filtered at read
//! time; rows remain until explicitly deleted.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use vanish_shared::records::Post;
use vanish_shared::types::UserId;

use crate::convert::{ts_col, uuid_col};
use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    pub fn insert_post(&self, post: &Post) -> Result<()> {
        self.conn().execute(
            "INSERT INTO posts (id, author_id, content, image_url, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                post.id.to_string(),
                post.author_id.to_string(),
                post.content,
                post.image_url,
                post.created_at.to_rfc3339(),
                post.expires_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_post(&self, id: Uuid) -> Result<Post> {
        self.conn()
            .query_row(
                "SELECT id, author_id, content, image_url, created_at, expires_at
                 FROM posts WHERE id = ?1",
                params![id.to_string()],
                row_to_post,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Feed for a user: unexpired posts from the accounts they follow (and
    /// their own), newest first.
    pub fn get_feed(&self, user_id: UserId, limit: u32) -> Result<Vec<Post>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, author_id, content, image_url, created_at, expires_at
             FROM posts
             WHERE expires_at > ?2
               AND (author_id = ?1
                    OR author_id IN (
                        SELECT followed_id FROM followers WHERE follower_id = ?1))
             ORDER BY created_at DESC
             LIMIT ?3",
        )?;

        let rows = stmt.query_map(
            params![user_id.to_string(), Utc::now().to_rfc3339(), limit],
            row_to_post,
        )?;

        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }

    /// Delete a post; author only.
    pub fn delete_post(&self, id: Uuid, author_id: UserId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM posts WHERE id = ?1 AND author_id = ?2",
            params![id.to_string(), author_id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: uuid_col(row, 0)?,
        author_id: UserId(uuid_col(row, 1)?),
        content: row.get(2)?,
        image_url: row.get(3)?,
        created_at: ts_col(row, 4)?,
        expires_at: ts_col(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::insert_profile;
    use chrono::Duration;

    fn post(author_id: UserId, hours_left: i64) -> Post {
        let now = Utc::now();
        Post {
            id: Uuid::new_v4(),
            author_id,
            content: "hello".into(),
            image_url: None,
            created_at: now,
            expires_at: now + Duration::hours(hours_left),
        }
    }

    #[test]
    fn feed_filters_expired_and_unfollowed() {
        let db = Database::open_in_memory().unwrap();
        let me = insert_profile(&db, "me");
        let friend = insert_profile(&db, "friend");
        let stranger = insert_profile(&db, "stranger");
        db.follow(me, friend).unwrap();

        let visible = post(friend, 24);
        let expired = post(friend, -1);
        let unfollowed = post(stranger, 24);
        db.insert_post(&visible).unwrap();
        db.insert_post(&expired).unwrap();
        db.insert_post(&unfollowed).unwrap();

        let feed = db.get_feed(me, 50).unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].id, visible.id);

        // The expired row still exists until explicitly deleted.
        assert!(db.get_post(expired.id).is_ok());
    }
}
