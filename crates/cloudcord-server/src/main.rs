//! # cloudcord-server
//!
//! Social graph and conversation service.
//!
//! This binary provides:
//! - **Conversations** addressed by the sorted pair of participants, with
//!   a notification event per message sent
//! - **Users and friendships** in the relational store, mirrored into a
//!   graph store that answers friend-of-friend recommendations
//! - **Account deletion propagation** over the in-process event channel
//! - **REST API** (axum) over both services

mod api;
mod chat;
mod config;
mod error;
mod events;
mod social;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use cloudcord_store::Stores;

use crate::api::AppState;
use crate::chat::ConversationService;
use crate::config::{ServerConfig, StoreBackend};
use crate::events::{Dispatcher, EventPublisher};
use crate::social::SocialGraphService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cloudcord_server=debug")),
        )
        .init();

    info!("Starting cloudcord server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open stores
    // -----------------------------------------------------------------------
    let stores = match config.store_backend {
        StoreBackend::Sqlite => Stores::open_sqlite(&config.data_dir)?,
        StoreBackend::Memory => {
            info!("Using in-memory stores, nothing will be persisted");
            Stores::in_memory()
        }
    };
    stores.health_check().await?;

    // -----------------------------------------------------------------------
    // 4. Event channel and services
    // -----------------------------------------------------------------------
    let (publisher, consumer) = events::channel(
        config.queues.clone(),
        config.event_channel_capacity,
        config.event_max_attempts,
    );
    let shared_publisher: Arc<dyn EventPublisher> = Arc::new(publisher.clone());

    let conversations =
        ConversationService::new(stores.conversations.clone(), shared_publisher.clone());
    let social = SocialGraphService::new(&stores, shared_publisher);

    let dispatcher = Arc::new(Dispatcher::new(conversations.clone()));
    let consumer_task = tokio::spawn(consumer.run(dispatcher));

    let app_state = AppState {
        conversations,
        social,
    };

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server until it fails or Ctrl+C arrives
    // -----------------------------------------------------------------------
    let served = tokio::select! {
        result = api::serve(app_state, config.http_addr) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    };

    // -----------------------------------------------------------------------
    // 6. Drain the event channel, then close the stores
    // -----------------------------------------------------------------------
    publisher.shutdown().await;
    if let Err(e) = consumer_task.await {
        tracing::error!(error = %e, "Event consumer task failed");
    }

    stores.close().await?;
    info!("Stores closed");

    if let Err(e) = &served {
        tracing::error!(error = %e, "HTTP server failed");
    }
    served
}
