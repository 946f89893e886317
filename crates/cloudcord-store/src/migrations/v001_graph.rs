//! v001 -- Node/edge tables for friendship traversal.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    id TEXT PRIMARY KEY NOT NULL                  -- string-encoded user id
);

CREATE TABLE IF NOT EXISTS edges (
    source   TEXT NOT NULL,                       -- FK -> nodes(id)
    target   TEXT NOT NULL,                       -- FK -> nodes(id)
    relation TEXT NOT NULL,

    PRIMARY KEY (source, target, relation),
    FOREIGN KEY (source) REFERENCES nodes(id) ON DELETE CASCADE,
    FOREIGN KEY (target) REFERENCES nodes(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
