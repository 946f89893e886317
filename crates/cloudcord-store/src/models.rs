//! Domain model structs persisted by the stores.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cloudcord_shared::{PairKey, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A user record owned by the relational store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    /// Subject issued by the identity provider. Unique and immutable.
    pub external_identity: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// A single chat message. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub content: String,
    pub sent_by_user: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(sender: &str, content: &str) -> Self {
        Self {
            content: content.to_string(),
            sent_by_user: sender.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// The conversation document for one unordered pair of participants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub pair_key: PairKey,
    /// Insertion order.
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn empty(pair_key: PairKey) -> Self {
        Self {
            pair_key,
            messages: Vec::new(),
        }
    }

    pub fn seeded(pair_key: PairKey, message: Message) -> Self {
        Self {
            pair_key,
            messages: vec![message],
        }
    }
}

// ---------------------------------------------------------------------------
// Graph traversal
// ---------------------------------------------------------------------------

/// A friend-of-friend node returned by the graph store, before enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendCandidate {
    /// Graph node key (string-encoded user id).
    pub node: String,
    /// Number of distinct two-hop paths to this node.
    pub mutual_friend_count: u32,
}
