//! v001 -- Relational schema: `users` and the symmetric `friendships` table.

use rusqlite::Connection;

const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    external_identity TEXT NOT NULL UNIQUE,       -- identity provider subject
    display_name      TEXT NOT NULL,
    created_at        TEXT NOT NULL               -- RFC-3339
);

-- ----------------------------------------------------------------
-- Friendships (one row per direction)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS friendships (
    user_id    INTEGER NOT NULL,                  -- FK -> users(id)
    friend_id  INTEGER NOT NULL,                  -- FK -> users(id)
    created_at TEXT NOT NULL,

    PRIMARY KEY (user_id, friend_id),
    CHECK (user_id <> friend_id),
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (friend_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_friendships_friend_id ON friendships(friend_id);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
