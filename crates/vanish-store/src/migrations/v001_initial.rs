//! v001 -- Initial schema creation.
//!
//! Creates the core tables: `profiles`, `sessions`, `conversations`,
//! `conversation_participants`, `messages`, `notifications`, `posts`,
//! `comments`, and `followers`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Profiles
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS profiles (
    user_id      TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    username     TEXT NOT NULL UNIQUE,
    display_name TEXT,
    avatar_url   TEXT,
    created_at   TEXT NOT NULL                -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Sessions (bearer token -> user)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sessions (
    token      TEXT PRIMARY KEY NOT NULL,
    user_id    TEXT NOT NULL,                 -- FK -> profiles(user_id)
    created_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES profiles(user_id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Conversations
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS conversations (
    id               TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    kind             TEXT NOT NULL,              -- 'direct' | 'group'
    name             TEXT,                       -- group conversations only
    created_by       TEXT NOT NULL,              -- UUID of the creator
    created_at       TEXT NOT NULL,
    expires_at       TEXT,                       -- nullable whole-conversation expiry
    last_activity_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversations_last_activity
    ON conversations(last_activity_at DESC);

-- ----------------------------------------------------------------
-- Conversation participants
--
-- Rows are never deleted by "leave"; left_at is set instead, keeping
-- history available for permission checks.  Deleting the conversation
-- cascades.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS conversation_participants (
    conversation_id TEXT NOT NULL,              -- FK -> conversations(id)
    user_id         TEXT NOT NULL,              -- FK -> profiles(user_id)
    role            TEXT NOT NULL,              -- 'admin' | 'member'
    joined_at       TEXT NOT NULL,
    left_at         TEXT,                       -- null while active
    invite_status   TEXT NOT NULL,              -- 'pending' | 'accepted' | 'declined'

    PRIMARY KEY (conversation_id, user_id),
    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_participants_user
    ON conversation_participants(user_id, invite_status);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id                  TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    conversation_id     TEXT NOT NULL,              -- FK -> conversations(id)
    sender_id           TEXT NOT NULL,              -- UUID of the sender
    content             TEXT NOT NULL,
    kind                TEXT NOT NULL,              -- 'text' | 'image' | 'file'
    created_at          TEXT NOT NULL,
    expires_at          TEXT NOT NULL,              -- created_at + expiration hours
    read_by             TEXT NOT NULL DEFAULT '{}', -- JSON map user_id -> timestamp
    edited_at           TEXT,
    reply_to            TEXT,                       -- nullable message UUID
    screenshot_detected INTEGER NOT NULL DEFAULT 0, -- boolean 0/1

    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation_ts
    ON messages(conversation_id, created_at ASC);

-- ----------------------------------------------------------------
-- Notifications
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS notifications (
    id         TEXT PRIMARY KEY NOT NULL,      -- UUID v4
    user_id    TEXT NOT NULL,                  -- recipient
    kind       TEXT NOT NULL,                  -- 'message' | 'invitation' | 'system' | 'friend_request'
    title      TEXT NOT NULL,
    body       TEXT NOT NULL,
    read       INTEGER NOT NULL DEFAULT 0,     -- boolean 0/1
    payload    TEXT NOT NULL DEFAULT '{}',     -- opaque JSON
    created_at TEXT NOT NULL,
    expires_at TEXT                            -- nullable
);

CREATE INDEX IF NOT EXISTS idx_notifications_user
    ON notifications(user_id, created_at DESC);

-- ----------------------------------------------------------------
-- Posts (ephemeral)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS posts (
    id         TEXT PRIMARY KEY NOT NULL,      -- UUID v4
    author_id  TEXT NOT NULL,                  -- FK -> profiles(user_id)
    content    TEXT NOT NULL,
    image_url  TEXT,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,

    FOREIGN KEY (author_id) REFERENCES profiles(user_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_posts_author_ts
    ON posts(author_id, created_at DESC);

-- ----------------------------------------------------------------
-- Comments (nested via parent_comment_id)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS comments (
    id                TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    post_id           TEXT NOT NULL,              -- FK -> posts(id)
    author_id         TEXT NOT NULL,
    parent_comment_id TEXT,                       -- nullable FK -> comments(id)
    content           TEXT NOT NULL,
    created_at        TEXT NOT NULL,

    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
    FOREIGN KEY (parent_comment_id) REFERENCES comments(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at ASC);

-- ----------------------------------------------------------------
-- Followers
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS followers (
    follower_id TEXT NOT NULL,                 -- FK -> profiles(user_id)
    followed_id TEXT NOT NULL,                 -- FK -> profiles(user_id)
    created_at  TEXT NOT NULL,

    PRIMARY KEY (follower_id, followed_id),
    FOREIGN KEY (follower_id) REFERENCES profiles(user_id) ON DELETE CASCADE,
    FOREIGN KEY (followed_id) REFERENCES profiles(user_id) ON DELETE CASCADE
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
