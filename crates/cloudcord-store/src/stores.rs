//! The bundle of store handles a service process runs against.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::conversations::ConversationDb;
use crate::database::Database;
use crate::error::Result;
use crate::graph::GraphDb;
use crate::memory::{MemoryConversations, MemoryGraph, MemoryRelational};
use crate::traits::{ConversationStore, FriendshipStore, GraphStore, Store, UserStore};

pub const USERS_DB: &str = "users.db";
pub const CONVERSATIONS_DB: &str = "conversations.db";
pub const GRAPH_DB: &str = "graph.db";

/// Explicitly opened store handles, injected into the services.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub friendships: Arc<dyn FriendshipStore>,
    pub conversations: Arc<dyn ConversationStore>,
    pub graph: Arc<dyn GraphStore>,
    /// One entry per underlying store; users and friendships share one.
    backends: Vec<Arc<dyn Store>>,
}

impl Stores {
    /// Open the three SQLite files under `dir`.
    pub fn open_sqlite(dir: &Path) -> Result<Self> {
        let relational = Arc::new(Database::open_at(&dir.join(USERS_DB))?);
        let conversations = Arc::new(ConversationDb::open_at(&dir.join(CONVERSATIONS_DB))?);
        let graph = Arc::new(GraphDb::open_at(&dir.join(GRAPH_DB))?);

        Ok(Self {
            users: relational.clone(),
            friendships: relational.clone(),
            conversations: conversations.clone(),
            graph: graph.clone(),
            backends: vec![
                relational as Arc<dyn Store>,
                conversations as Arc<dyn Store>,
                graph as Arc<dyn Store>,
            ],
        })
    }

    pub fn in_memory() -> Self {
        let relational = Arc::new(MemoryRelational::new());
        let conversations = Arc::new(MemoryConversations::new());
        let graph = Arc::new(MemoryGraph::new());

        Self {
            users: relational.clone(),
            friendships: relational.clone(),
            conversations: conversations.clone(),
            graph: graph.clone(),
            backends: vec![
                relational as Arc<dyn Store>,
                conversations as Arc<dyn Store>,
                graph as Arc<dyn Store>,
            ],
        }
    }

    /// Fails on the first backend that cannot serve requests.
    pub async fn health_check(&self) -> Result<()> {
        for backend in &self.backends {
            backend.health_check().await?;
            tracing::debug!(store = backend.name(), "store healthy");
        }
        Ok(())
    }

    /// Close every backend. All are attempted; the first error is returned.
    pub async fn close(&self) -> Result<()> {
        let mut first_err = None;
        for backend in &self.backends {
            if let Err(e) = backend.close().await {
                tracing::warn!(store = backend.name(), error = %e, "failed to close store");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Platform data directory for the store files, or `./data` when the
/// platform has none.
pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "cloudcord", "cloudcord")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("data"))
}
