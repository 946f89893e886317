//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use cloudcord_shared::EventKind;

/// Which store implementations the process runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Three SQLite files under `data_dir`.
    Sqlite,
    /// Process-local stores; nothing survives a restart.
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

/// Queue each event kind is published on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueNames {
    pub message_notification: String,
    pub account_deleted: String,
}

impl QueueNames {
    pub fn queue_for(&self, kind: EventKind) -> &str {
        match kind {
            EventKind::MessageNotification => &self.message_notification,
            EventKind::AccountDeleted => &self.account_deleted,
        }
    }

    pub fn kind_of(&self, queue: &str) -> Option<EventKind> {
        if queue == self.message_notification {
            Some(EventKind::MessageNotification)
        } else if queue == self.account_deleted {
            Some(EventKind::AccountDeleted)
        } else {
            None
        }
    }
}

impl Default for QueueNames {
    fn default() -> Self {
        Self {
            message_notification: "message_notifications".to_string(),
            account_deleted: "user_deletions".to_string(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8084`
    pub http_addr: SocketAddr,

    /// Env: `STORE_BACKEND` (`sqlite` / `memory`)
    /// Default: `sqlite`
    pub store_backend: StoreBackend,

    /// Directory holding `users.db`, `conversations.db` and `graph.db`.
    /// Env: `DATA_DIR`
    /// Default: the platform data directory, or `./data`.
    pub data_dir: PathBuf,

    /// Env: `NOTIFICATION_QUEUE`, `ACCOUNT_DELETION_QUEUE`
    pub queues: QueueNames,

    /// Bound of the in-process event channel.
    /// Env: `EVENT_CHANNEL_CAPACITY`
    /// Default: `256`
    pub event_channel_capacity: usize,

    /// Deliveries per event before the consumer gives up on it.
    /// Env: `EVENT_MAX_ATTEMPTS`
    /// Default: `3`
    pub event_max_attempts: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8084).into(),
            store_backend: StoreBackend::Sqlite,
            data_dir: cloudcord_store::default_data_dir(),
            queues: QueueNames::default(),
            event_channel_capacity: 256,
            event_max_attempts: 3,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(backend) = lookup("STORE_BACKEND") {
            match backend.parse::<StoreBackend>() {
                Ok(parsed) => config.store_backend = parsed,
                Err(e) => tracing::warn!(error = %e, "Invalid STORE_BACKEND, using default"),
            }
        }

        if let Some(dir) = lookup("DATA_DIR") {
            if !dir.is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }

        if let Some(queue) = lookup("NOTIFICATION_QUEUE") {
            if !queue.is_empty() {
                config.queues.message_notification = queue;
            }
        }

        if let Some(queue) = lookup("ACCOUNT_DELETION_QUEUE") {
            if !queue.is_empty() {
                config.queues.account_deleted = queue;
            }
        }

        if config.queues.message_notification == config.queues.account_deleted {
            tracing::warn!(
                queue = %config.queues.account_deleted,
                "Both event kinds share one queue, using default queue names"
            );
            config.queues = QueueNames::default();
        }

        if let Some(val) = lookup("EVENT_CHANNEL_CAPACITY") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.event_channel_capacity = n,
                _ => tracing::warn!(value = %val, "Invalid EVENT_CHANNEL_CAPACITY, using default"),
            }
        }

        if let Some(val) = lookup("EVENT_MAX_ATTEMPTS") {
            match val.parse::<u32>() {
                Ok(n) if n > 0 => config.event_max_attempts = n,
                _ => tracing::warn!(value = %val, "Invalid EVENT_MAX_ATTEMPTS, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }
}
