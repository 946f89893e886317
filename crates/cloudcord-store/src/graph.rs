//! Graph store used for friendship traversal.
//!
//! Nodes are string-encoded user ids; every friendship is two directed
//! `FRIEND` edges. Traversals run as SQL joins over the `edges` table, and
//! "traversal order" is the order edges were first written (their rowid).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::params;

use crate::database::SqliteHandle;
use crate::error::Result;
use crate::migrations;
use crate::models::FriendCandidate;
use crate::traits::{GraphStore, Store};

/// Relation name of a friendship edge.
pub const FRIEND: &str = "FRIEND";

pub struct GraphDb {
    handle: SqliteHandle,
    path: Option<PathBuf>,
}

impl GraphDb {
    pub fn open_at(path: &Path) -> Result<Self> {
        Ok(Self {
            handle: SqliteHandle::open(path, "graph", migrations::GRAPH)?,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            handle: SqliteHandle::open_in_memory("graph", migrations::GRAPH)?,
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[async_trait]
impl Store for GraphDb {
    fn name(&self) -> &'static str {
        "sqlite-graph"
    }

    async fn health_check(&self) -> Result<()> {
        self.handle.health_check().await
    }

    async fn close(&self) -> Result<()> {
        self.handle.close().await
    }
}

#[async_trait]
impl GraphStore for GraphDb {
    async fn merge_friendship(&self, a: &str, b: &str) -> Result<()> {
        let (a, b) = (a.to_string(), b.to_string());
        self.handle
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("INSERT OR IGNORE INTO nodes (id) VALUES (?1)", params![a])?;
                tx.execute("INSERT OR IGNORE INTO nodes (id) VALUES (?1)", params![b])?;
                tx.execute(
                    "INSERT OR IGNORE INTO edges (source, target, relation) VALUES (?1, ?2, ?3)",
                    params![a, b, FRIEND],
                )?;
                tx.execute(
                    "INSERT OR IGNORE INTO edges (source, target, relation) VALUES (?1, ?2, ?3)",
                    params![b, a, FRIEND],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
    }

    async fn friends_of_friends(&self, node: &str) -> Result<Vec<FriendCandidate>> {
        let node = node.to_string();
        self.handle
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT fof.target, COUNT(DISTINCT f.target) AS mutual
                     FROM edges f
                     JOIN edges fof ON fof.source = f.target AND fof.relation = ?2
                     WHERE f.source = ?1
                       AND f.relation = ?2
                       AND fof.target <> ?1
                       AND fof.target NOT IN (
                           SELECT target FROM edges WHERE source = ?1 AND relation = ?2
                       )
                     GROUP BY fof.target
                     ORDER BY mutual DESC, MIN(fof.rowid) ASC",
                )?;
                let rows = stmt.query_map(params![node, FRIEND], |row| {
                    Ok(FriendCandidate {
                        node: row.get(0)?,
                        mutual_friend_count: row.get(1)?,
                    })
                })?;

                let mut candidates = Vec::new();
                for row in rows {
                    candidates.push(row?);
                }
                Ok(candidates)
            })
            .await
    }

    async fn neighbors(&self, node: &str) -> Result<Vec<String>> {
        let node = node.to_string();
        self.handle
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT target FROM edges
                     WHERE source = ?1 AND relation = ?2
                     ORDER BY rowid ASC",
                )?;
                let rows = stmt.query_map(params![node, FRIEND], |row| row.get::<_, String>(0))?;

                let mut neighbors = Vec::new();
                for row in rows {
                    neighbors.push(row?);
                }
                Ok(neighbors)
            })
            .await
    }

    async fn remove_node(&self, node: &str) -> Result<bool> {
        let node = node.to_string();
        self.handle
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM edges WHERE source = ?1 OR target = ?1",
                    params![node],
                )?;
                let removed = tx.execute("DELETE FROM nodes WHERE id = ?1", params![node])?;
                tx.commit()?;
                Ok(removed > 0)
            })
            .await
    }
}
