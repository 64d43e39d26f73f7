//! CRUD operations for nested [`Comment`] records.

use rusqlite::params;
use uuid::Uuid;

use vanish_shared::records::Comment;
use vanish_shared::types::UserId;

use crate::convert::{opt_uuid_col, ts_col, uuid_col};
use crate::database::Database;
use crate::error::Result;

impl Database {
    pub fn insert_comment(&self, comment: &Comment) -> Result<()> {
        self.conn().execute(
            "INSERT INTO comments (id, post_id, author_id, parent_comment_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                comment.id.to_string(),
                comment.post_id.to_string(),
                comment.author_id.to_string(),
                comment.parent_comment_id.map(|p| p.to_string()),
                comment.content,
                comment.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// All comments on a post, oldest first.  Nesting is reconstructed by
    /// the UI from `parent_comment_id`.
    pub fn list_comments(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, post_id, author_id, parent_comment_id, content, created_at
             FROM comments
             WHERE post_id = ?1
             ORDER BY created_at ASC",
        )?;

        let rows = stmt.query_map(params![post_id.to_string()], row_to_comment)?;

        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }
}

fn row_to_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: uuid_col(row, 0)?,
        post_id: uuid_col(row, 1)?,
        author_id: UserId(uuid_col(row, 2)?),
        parent_comment_id: opt_uuid_col(row, 3)?,
        content: row.get(4)?,
        created_at: ts_col(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::insert_profile;
    use chrono::{Duration, Utc};
    use vanish_shared::records::Post;

    #[test]
    fn nested_replies_keep_their_parent() {
        let db = Database::open_in_memory().unwrap();
        let author = insert_profile(&db, "a");
        let now = Utc::now();

        let post = Post {
            id: Uuid::new_v4(),
            author_id: author,
            content: "post".into(),
            image_url: None,
            created_at: now,
            expires_at: now + Duration::hours(24),
        };
        db.insert_post(&post).unwrap();

        let top = Comment {
            id: Uuid::new_v4(),
            post_id: post.id,
            author_id: author,
            parent_comment_id: None,
            content: "top".into(),
            created_at: now,
        };
        let reply = Comment {
            id: Uuid::new_v4(),
            post_id: post.id,
            author_id: author,
            parent_comment_id: Some(top.id),
            content: "reply".into(),
            created_at: now + Duration::seconds(1),
        };
        db.insert_comment(&top).unwrap();
        db.insert_comment(&reply).unwrap();

        let list = db.list_comments(post.id).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].parent_comment_id, Some(top.id));
    }
}
