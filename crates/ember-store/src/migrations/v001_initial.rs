//! v001 -- Initial schema creation.
//!
//! Creates the four core tables: `users`, `relationships`, `messages`, and
//! `message_seen`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users (profile subset needed for matching and event payloads)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id                TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    name              TEXT NOT NULL,
    image             TEXT NOT NULL,
    gender            TEXT NOT NULL,              -- 'male' | 'female'
    gender_preference TEXT NOT NULL,              -- 'male' | 'female' | 'both'
    created_at        TEXT NOT NULL               -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Relationships (directed edges; 'match' rows are written in
-- symmetric pairs inside one transaction)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS relationships (
    user_id    TEXT NOT NULL,                    -- FK -> users(id)
    target_id  TEXT NOT NULL,                    -- FK -> users(id)
    kind       TEXT NOT NULL,                    -- 'like' | 'dislike' | 'match' | 'block' | 'mute'
    created_at TEXT NOT NULL,

    PRIMARY KEY (user_id, target_id, kind),
    FOREIGN KEY (user_id)   REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (target_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_relationships_target
    ON relationships(target_id, kind);

-- ----------------------------------------------------------------
-- Messages (rowid preserves insertion order as the tie-break for
-- equal timestamps)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id          TEXT PRIMARY KEY NOT NULL,       -- UUID v4
    sender_id   TEXT NOT NULL,                   -- FK -> users(id)
    receiver_id TEXT NOT NULL,                   -- FK -> users(id)
    content     TEXT NOT NULL,
    created_at  TEXT NOT NULL,                   -- ISO-8601

    FOREIGN KEY (sender_id)   REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (receiver_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_pair
    ON messages(sender_id, receiver_id, created_at);

-- ----------------------------------------------------------------
-- Seen-by sets (insert-only; rows are never deleted)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS message_seen (
    message_id TEXT NOT NULL,                    -- FK -> messages(id)
    user_id    TEXT NOT NULL,                    -- FK -> users(id)

    PRIMARY KEY (message_id, user_id),
    FOREIGN KEY (message_id) REFERENCES messages(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id)    REFERENCES users(id) ON DELETE CASCADE
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
