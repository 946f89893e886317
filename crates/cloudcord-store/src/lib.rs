//! # cloudcord-store
//!
//! Persistence for the cloudcord services. Three independent stores, each a
//! SQLite file with its own migrations:
//!
//! - relational (`users.db`): user records and symmetric friendship rows
//! - documents (`conversations.db`): one JSON conversation per user pair
//! - graph (`graph.db`): `FRIEND` node/edge replica for traversal queries
//!
//! Services depend on the traits in [`traits`]; [`memory`] provides drop-in
//! in-memory implementations.

pub mod conversations;
pub mod database;
pub mod error;
pub mod friendships;
pub mod graph;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod stores;
pub mod traits;
pub mod users;

pub use conversations::ConversationDb;
pub use database::Database;
pub use error::{Result, StoreError};
pub use graph::GraphDb;
pub use memory::{MemoryConversations, MemoryGraph, MemoryRelational};
pub use models::{Conversation, FriendCandidate, Message, User};
pub use stores::{default_data_dir, Stores};
pub use traits::{ConversationStore, FriendshipStore, GraphStore, Store, UserStore};
