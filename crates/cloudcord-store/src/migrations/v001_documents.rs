//! v001 -- Conversation documents, one row per canonical pair.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    user_low  TEXT NOT NULL,                      -- pair_key[0]
    user_high TEXT NOT NULL,                      -- pair_key[1]
    document  TEXT NOT NULL,                      -- JSON {pair_key, messages}

    PRIMARY KEY (user_low, user_high),
    CHECK (user_low <= user_high)
);

CREATE INDEX IF NOT EXISTS idx_conversations_user_high ON conversations(user_high);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
