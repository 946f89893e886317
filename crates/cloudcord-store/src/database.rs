//! SQLite connection management.
//!
//! Every store file is owned by one [`SqliteHandle`]: a single
//! `rusqlite::Connection` behind a mutex, driven from tokio's blocking pool.
//! Migrations run before the handle is returned, and [`SqliteHandle::close`]
//! releases the connection so later calls fail as unavailable.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::migrations::{self, Migration};
use crate::traits::Store;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub(crate) struct SqliteHandle {
    conn: Arc<Mutex<Option<Connection>>>,
    label: &'static str,
}

impl SqliteHandle {
    /// Open (or create) a database file and bring its schema up to date.
    pub(crate) fn open(path: &Path, label: &'static str, migrations: &[Migration]) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::info!(store = label, path = %path.display(), "opening database");

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        // Other handles on the same file may hold the write lock briefly.
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::prepare(conn, label, migrations)
    }

    pub(crate) fn open_in_memory(label: &'static str, migrations: &[Migration]) -> Result<Self> {
        Self::prepare(Connection::open_in_memory()?, label, migrations)
    }

    fn prepare(conn: Connection, label: &'static str, migrations: &[Migration]) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run_migrations(&conn, migrations)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            label,
        })
    }

    /// Run `f` against the connection on the blocking pool.
    ///
    /// Calls are serialized by the mutex, so a single statement or
    /// transaction inside `f` never interleaves with another call.
    pub(crate) async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let label = self.label;
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable(format!("{label} connection lock poisoned")))?;
            let conn = guard
                .as_mut()
                .ok_or_else(|| StoreError::Unavailable(format!("{label} store is closed")))?;
            f(conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("{label} worker failed: {e}")))?
    }

    pub(crate) async fn health_check(&self) -> Result<()> {
        self.call(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    pub(crate) async fn close(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let label = self.label;
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable(format!("{label} connection lock poisoned")))?;
            if let Some(conn) = guard.take() {
                conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
                tracing::debug!(store = label, "database closed");
            }
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("{label} worker failed: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// Relational database
// ---------------------------------------------------------------------------

/// The relational store: `users` and `friendships`.
///
/// Implements both [`crate::UserStore`] and [`crate::FriendshipStore`]; the
/// two share this one handle, so closing either closes both.
pub struct Database {
    handle: SqliteHandle,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) the relational database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        Ok(Self {
            handle: SqliteHandle::open(path, "relational", migrations::RELATIONAL)?,
            path: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            handle: SqliteHandle::open_in_memory("relational", migrations::RELATIONAL)?,
            path: None,
        })
    }

    /// Return the filesystem path of the database, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn handle(&self) -> &SqliteHandle {
        &self.handle
    }
}

#[async_trait]
impl Store for Database {
    fn name(&self) -> &'static str {
        "sqlite-relational"
    }

    async fn health_check(&self) -> Result<()> {
        self.handle.health_check().await
    }

    async fn close(&self) -> Result<()> {
        self.handle.close().await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse an RFC-3339 column into a UTC timestamp.
pub(crate) fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("users.db");

        let db = Database::open_at(&path).expect("should open");
        assert_eq!(db.path(), Some(path.as_path()));
        assert!(path.exists());
        db.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn closed_handle_reports_unavailable() {
        let db = Database::open_in_memory().unwrap();
        db.close().await.unwrap();
        // Closing twice is harmless.
        db.close().await.unwrap();

        let err = db.health_check().await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
