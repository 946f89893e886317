//! Store capabilities the services depend on.
//!
//! Each trait has a SQLite implementation and an in-memory implementation
//! (see [`crate::memory`]), so services can be wired to either without
//! knowing which one they got.

use async_trait::async_trait;

use cloudcord_shared::{PairKey, UserId};

use crate::error::Result;
use crate::models::{Conversation, FriendCandidate, Message, User};

/// Lifecycle shared by every store handle.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Fails with [`crate::StoreError::Unavailable`] or a backend error when
    /// the store cannot serve requests.
    async fn health_check(&self) -> Result<()>;

    /// Flush and release the store. Further calls fail as unavailable.
    async fn close(&self) -> Result<()>;
}

/// User records in the relational store.
#[async_trait]
pub trait UserStore: Store {
    /// Create the user unless one with the same external identity exists.
    /// Returns the stored record either way.
    async fn provision_user(&self, external_identity: &str, display_name: &str) -> Result<User>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    async fn get_user_by_external_identity(&self, external_identity: &str)
        -> Result<Option<User>>;

    async fn list_users(&self) -> Result<Vec<User>>;

    /// Returns `false` if no such user exists.
    async fn rename_user(&self, id: UserId, display_name: &str) -> Result<bool>;

    /// Remove the user and every friendship row touching it. Returns the
    /// removed record, or `None` if it was already absent.
    async fn delete_user(&self, id: UserId) -> Result<Option<User>>;
}

/// Symmetric friendship rows in the relational store.
#[async_trait]
pub trait FriendshipStore: Store {
    /// Insert both directed rows. Existing rows are left untouched.
    /// Returns `true` if the forward row was newly created.
    ///
    /// Fails with `NotFound` if either user does not exist.
    async fn insert_friendship(&self, user: UserId, friend: UserId) -> Result<bool>;

    /// Single directed-row lookup.
    async fn friendship_exists(&self, user: UserId, other: UserId) -> Result<bool>;

    async fn list_friends(&self, user: UserId) -> Result<Vec<UserId>>;
}

/// Conversation documents keyed by canonical pair.
#[async_trait]
pub trait ConversationStore: Store {
    /// Append `message` to the conversation for `key`, creating the document
    /// seeded with it when none exists. Atomic: concurrent first messages
    /// for the same pair end up in a single document.
    async fn append_message(&self, key: &PairKey, message: &Message) -> Result<()>;

    async fn find_conversation(&self, key: &PairKey) -> Result<Option<Conversation>>;

    /// Create an empty conversation, or return the one that already exists.
    async fn create_conversation(&self, key: &PairKey) -> Result<Conversation>;

    /// Remove every conversation whose pair key contains `participant`.
    /// Returns the number removed; zero is not an error.
    async fn delete_conversations_for(&self, participant: &str) -> Result<u64>;
}

/// Traversal replica of the friendship relation.
#[async_trait]
pub trait GraphStore: Store {
    /// Merge both nodes and both directed `FRIEND` edges.
    async fn merge_friendship(&self, a: &str, b: &str) -> Result<()>;

    /// Nodes exactly two `FRIEND` hops from `node`, excluding `node` and its
    /// direct neighbours, ranked by mutual-friend count descending and then
    /// by traversal order.
    async fn friends_of_friends(&self, node: &str) -> Result<Vec<FriendCandidate>>;

    /// Direct `FRIEND` neighbours in traversal order.
    async fn neighbors(&self, node: &str) -> Result<Vec<String>>;

    /// Remove the node and all of its edges. Returns `false` if absent.
    async fn remove_node(&self, node: &str) -> Result<bool>;
}
