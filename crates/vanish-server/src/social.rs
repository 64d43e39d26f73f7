//! Social surface: ephemeral posts, nested comments, follower edges.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use vanish_shared::api::{CreateCommentRequest, CreatePostRequest};
use vanish_shared::records::{expiry_from, validate_content, Comment, Post};
use vanish_shared::types::UserId;
use vanish_store::Database;

use crate::broadcast::Broadcaster;
use crate::error::ApiError;
use crate::notify;

/// Create an ephemeral post.  Expiry defaults like messages do.
pub fn create_post(
    db: &Database,
    author: UserId,
    req: CreatePostRequest,
) -> Result<Post, ApiError> {
    let content = validate_content(&req.content)?;

    let now = Utc::now();
    let post = Post {
        id: Uuid::new_v4(),
        author_id: author,
        content,
        image_url: req.image_url,
        created_at: now,
        expires_at: expiry_from(now, req.expiration_hours),
    };
    db.insert_post(&post)?;

    info!(post = %post.id, author = %author, "post created");
    Ok(post)
}

/// Unexpired posts from the caller and the accounts they follow.
pub fn get_feed(db: &Database, user: UserId, limit: u32) -> Result<Vec<Post>, ApiError> {
    db.get_feed(user, limit).map_err(ApiError::from)
}

/// Comment on a post; `parent_comment_id` nests the reply.
pub fn create_comment(
    db: &Database,
    author: UserId,
    req: CreateCommentRequest,
) -> Result<Comment, ApiError> {
    let content = validate_content(&req.content)?;

    // The post must still exist (it may have been deleted, not merely
    // expired).
    db.get_post(req.post_id)
        .map_err(|_| ApiError::NotFound("post not found".into()))?;

    let comment = Comment {
        id: Uuid::new_v4(),
        post_id: req.post_id,
        author_id: author,
        parent_comment_id: req.parent_comment_id,
        content,
        created_at: Utc::now(),
    };
    db.insert_comment(&comment)?;
    Ok(comment)
}

/// Follow a user, notifying them on the first follow.
pub fn follow_user(
    db: &Database,
    hub: &Broadcaster,
    follower: UserId,
    followed: UserId,
) -> Result<(), ApiError> {
    if follower == followed {
        return Err(ApiError::BadRequest("cannot follow yourself".into()));
    }

    let created = db.follow(follower, followed)?;
    if created {
        notify::follow_notification(db, hub, follower, followed)?;
    }
    Ok(())
}

pub fn unfollow_user(db: &Database, follower: UserId, followed: UserId) -> Result<(), ApiError> {
    db.unfollow(follower, followed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{register_user, seeded_db};

    #[test]
    fn follow_notifies_once() {
        let (db, hub) = seeded_db();
        let a = register_user(&db, "a");
        let b = register_user(&db, "b");

        follow_user(&db, &hub, a, b).unwrap();
        follow_user(&db, &hub, a, b).unwrap();
        assert_eq!(db.list_notifications(b).unwrap().len(), 1);

        assert!(matches!(
            follow_user(&db, &hub, a, a),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn comment_requires_existing_post() {
        let (db, _hub) = seeded_db();
        let a = register_user(&db, "a");

        let req = CreateCommentRequest {
            post_id: Uuid::new_v4(),
            parent_comment_id: None,
            content: "hi".into(),
        };
        assert!(matches!(
            create_comment(&db, a, req),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn feed_round_trip() {
        let (db, hub) = seeded_db();
        let a = register_user(&db, "a");
        let b = register_user(&db, "b");
        follow_user(&db, &hub, a, b).unwrap();

        let post = create_post(
            &db,
            b,
            CreatePostRequest {
                content: "hello".into(),
                image_url: None,
                expiration_hours: Some(1),
            },
        )
        .unwrap();

        let feed = get_feed(&db, a, 50).unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].id, post.id);
    }
}
