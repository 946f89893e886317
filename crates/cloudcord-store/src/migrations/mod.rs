//! Database migration runner.
//!
//! Each store file (relational, document, graph) carries its own ordered list
//! of migrations. Every migration is guarded by the `user_version` pragma so
//! it runs exactly once per file.

pub mod v001_documents;
pub mod v001_graph;
pub mod v001_relational;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// A single schema step.
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub up: fn(&Connection) -> std::result::Result<(), rusqlite::Error>,
}

/// Users and friendships.
pub const RELATIONAL: &[Migration] = &[Migration {
    version: 1,
    name: "v001_relational",
    up: v001_relational::up,
}];

/// Conversation documents.
pub const DOCUMENTS: &[Migration] = &[Migration {
    version: 1,
    name: "v001_documents",
    up: v001_documents::up,
}];

/// Friendship traversal graph.
pub const GRAPH: &[Migration] = &[Migration {
    version: 1,
    name: "v001_graph",
    up: v001_graph::up,
}];

/// Run all pending migrations against the open connection.
///
/// Reads `PRAGMA user_version` to determine which migrations have already been
/// applied, then executes any outstanding ones in order.
pub fn run_migrations(conn: &Connection, migrations: &[Migration]) -> Result<()> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    let target = migrations.last().map(|m| m.version).unwrap_or(0);

    tracing::debug!(
        current_version = current,
        target_version = target,
        "checking database migrations"
    );

    for migration in migrations.iter().filter(|m| m.version > current) {
        tracing::info!(migration = migration.name, "applying migration");
        (migration.up)(conn)
            .map_err(|e| StoreError::Migration(format!("{}: {e}", migration.name)))?;
        conn.pragma_update(None, "user_version", migration.version)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn, RELATIONAL).unwrap();
        run_migrations(&conn, RELATIONAL).unwrap();

        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_each_schema_creates_its_tables() {
        for (migrations, table) in [
            (RELATIONAL, "friendships"),
            (DOCUMENTS, "conversations"),
            (GRAPH, "edges"),
        ] {
            let conn = Connection::open_in_memory().unwrap();
            run_migrations(&conn, migrations).unwrap();
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }
}
