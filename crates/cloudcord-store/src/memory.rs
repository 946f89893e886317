//! In-memory store implementations.
//!
//! Used by tests and by the `memory` backend. They follow the same contracts
//! as the SQLite stores, including failing with `Unavailable` after
//! [`Store::close`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use cloudcord_shared::{PairKey, UserId};

use crate::error::{Result, StoreError};
use crate::models::{Conversation, FriendCandidate, Message, User};
use crate::traits::{ConversationStore, FriendshipStore, GraphStore, Store, UserStore};

struct Guarded<T> {
    state: Mutex<T>,
    closed: Mutex<bool>,
    label: &'static str,
}

impl<T: Default> Guarded<T> {
    fn new(label: &'static str) -> Self {
        Self {
            state: Mutex::new(T::default()),
            closed: Mutex::new(false),
            label,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, T>> {
        let closed = *self
            .closed
            .lock()
            .map_err(|_| StoreError::Unavailable(format!("{} lock poisoned", self.label)))?;
        if closed {
            return Err(StoreError::Unavailable(format!("{} store is closed", self.label)));
        }
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable(format!("{} lock poisoned", self.label)))
    }

    fn close(&self) -> Result<()> {
        let mut closed = self
            .closed
            .lock()
            .map_err(|_| StoreError::Unavailable(format!("{} lock poisoned", self.label)))?;
        *closed = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Relational
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RelationalState {
    next_id: i64,
    users: BTreeMap<i64, User>,
    /// Directed rows in insertion order.
    friendships: Vec<(UserId, UserId)>,
}

/// Users and friendships, mirroring [`crate::Database`].
pub struct MemoryRelational {
    inner: Guarded<RelationalState>,
}

impl MemoryRelational {
    pub fn new() -> Self {
        Self {
            inner: Guarded::new("memory-relational"),
        }
    }
}

impl Default for MemoryRelational {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryRelational {
    fn name(&self) -> &'static str {
        "memory-relational"
    }

    async fn health_check(&self) -> Result<()> {
        self.inner.lock().map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        self.inner.close()
    }
}

#[async_trait]
impl UserStore for MemoryRelational {
    async fn provision_user(&self, external_identity: &str, display_name: &str) -> Result<User> {
        let mut state = self.inner.lock()?;
        if let Some(existing) = state
            .users
            .values()
            .find(|u| u.external_identity == external_identity)
        {
            return Ok(existing.clone());
        }

        state.next_id += 1;
        let user = User {
            id: UserId(state.next_id),
            external_identity: external_identity.to_string(),
            display_name: display_name.to_string(),
            created_at: Utc::now(),
        };
        state.users.insert(user.id.0, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.inner.lock()?.users.get(&id.0).cloned())
    }

    async fn get_user_by_external_identity(
        &self,
        external_identity: &str,
    ) -> Result<Option<User>> {
        Ok(self
            .inner
            .lock()?
            .users
            .values()
            .find(|u| u.external_identity == external_identity)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.inner.lock()?.users.values().cloned().collect())
    }

    async fn rename_user(&self, id: UserId, display_name: &str) -> Result<bool> {
        let mut state = self.inner.lock()?;
        match state.users.get_mut(&id.0) {
            Some(user) => {
                user.display_name = display_name.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_user(&self, id: UserId) -> Result<Option<User>> {
        let mut state = self.inner.lock()?;
        let removed = state.users.remove(&id.0);
        if removed.is_some() {
            state.friendships.retain(|(a, b)| *a != id && *b != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl FriendshipStore for MemoryRelational {
    async fn insert_friendship(&self, user: UserId, friend: UserId) -> Result<bool> {
        if user == friend {
            return Ok(false);
        }

        let mut state = self.inner.lock()?;
        if !state.users.contains_key(&user.0) || !state.users.contains_key(&friend.0) {
            return Err(StoreError::NotFound(format!("user {user} or {friend}")));
        }

        let mut inserted = false;
        for row in [(user, friend), (friend, user)] {
            if !state.friendships.contains(&row) {
                inserted |= row == (user, friend);
                state.friendships.push(row);
            }
        }
        Ok(inserted)
    }

    async fn friendship_exists(&self, user: UserId, other: UserId) -> Result<bool> {
        Ok(self.inner.lock()?.friendships.contains(&(user, other)))
    }

    async fn list_friends(&self, user: UserId) -> Result<Vec<UserId>> {
        Ok(self
            .inner
            .lock()?
            .friendships
            .iter()
            .filter(|(a, _)| *a == user)
            .map(|(_, b)| *b)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Conversation documents, mirroring [`crate::ConversationDb`].
pub struct MemoryConversations {
    inner: Guarded<HashMap<PairKey, Conversation>>,
}

impl MemoryConversations {
    pub fn new() -> Self {
        Self {
            inner: Guarded::new("memory-documents"),
        }
    }
}

impl Default for MemoryConversations {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryConversations {
    fn name(&self) -> &'static str {
        "memory-documents"
    }

    async fn health_check(&self) -> Result<()> {
        self.inner.lock().map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        self.inner.close()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversations {
    async fn append_message(&self, key: &PairKey, message: &Message) -> Result<()> {
        self.inner
            .lock()?
            .entry(key.clone())
            .or_insert_with(|| Conversation::empty(key.clone()))
            .messages
            .push(message.clone());
        Ok(())
    }

    async fn find_conversation(&self, key: &PairKey) -> Result<Option<Conversation>> {
        Ok(self.inner.lock()?.get(key).cloned())
    }

    async fn create_conversation(&self, key: &PairKey) -> Result<Conversation> {
        Ok(self
            .inner
            .lock()?
            .entry(key.clone())
            .or_insert_with(|| Conversation::empty(key.clone()))
            .clone())
    }

    async fn delete_conversations_for(&self, participant: &str) -> Result<u64> {
        let mut documents = self.inner.lock()?;
        let before = documents.len();
        documents.retain(|key, _| !key.contains(participant));
        Ok((before - documents.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

#[derive(Default)]
struct GraphState {
    nodes: HashSet<String>,
    /// Directed `FRIEND` edges in the order they were first written.
    edges: Vec<(String, String)>,
}

/// Traversal replica, mirroring [`crate::GraphDb`].
pub struct MemoryGraph {
    inner: Guarded<GraphState>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self {
            inner: Guarded::new("memory-graph"),
        }
    }
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryGraph {
    fn name(&self) -> &'static str {
        "memory-graph"
    }

    async fn health_check(&self) -> Result<()> {
        self.inner.lock().map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        self.inner.close()
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn merge_friendship(&self, a: &str, b: &str) -> Result<()> {
        let mut graph = self.inner.lock()?;
        graph.nodes.insert(a.to_string());
        graph.nodes.insert(b.to_string());
        for edge in [(a.to_string(), b.to_string()), (b.to_string(), a.to_string())] {
            if !graph.edges.contains(&edge) {
                graph.edges.push(edge);
            }
        }
        Ok(())
    }

    async fn friends_of_friends(&self, node: &str) -> Result<Vec<FriendCandidate>> {
        let graph = self.inner.lock()?;
        let direct: HashSet<&str> = graph
            .edges
            .iter()
            .filter(|(source, _)| source == node)
            .map(|(_, target)| target.as_str())
            .collect();

        // candidate -> (first edge index, distinct intermediaries)
        let mut found: HashMap<&str, (usize, HashSet<&str>)> = HashMap::new();
        for (idx, (via, target)) in graph.edges.iter().enumerate() {
            if !direct.contains(via.as_str()) || target == node || direct.contains(target.as_str())
            {
                continue;
            }
            found
                .entry(target.as_str())
                .or_insert_with(|| (idx, HashSet::new()))
                .1
                .insert(via.as_str());
        }

        let mut ranked: Vec<_> = found.into_iter().collect();
        ranked.sort_by(|(_, (a_idx, a_via)), (_, (b_idx, b_via))| {
            b_via.len().cmp(&a_via.len()).then(a_idx.cmp(b_idx))
        });

        Ok(ranked
            .into_iter()
            .map(|(candidate, (_, via))| FriendCandidate {
                node: candidate.to_string(),
                mutual_friend_count: via.len() as u32,
            })
            .collect())
    }

    async fn neighbors(&self, node: &str) -> Result<Vec<String>> {
        Ok(self
            .inner
            .lock()?
            .edges
            .iter()
            .filter(|(source, _)| source == node)
            .map(|(_, target)| target.clone())
            .collect())
    }

    async fn remove_node(&self, node: &str) -> Result<bool> {
        let mut graph = self.inner.lock()?;
        graph.edges.retain(|(a, b)| a != node && b != node);
        Ok(graph.nodes.remove(node))
    }
}
