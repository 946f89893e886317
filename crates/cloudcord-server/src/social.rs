//! Social graph service.
//!
//! Friendships live in the relational store (source of truth) and are
//! mirrored into the graph store, which answers the multi-hop
//! recommendation query. The two are written one after the other with no
//! cross-store transaction: a failed mirror write is reported as
//! [`ServiceError::PartialWriteFailure`] and the relational write stays.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use cloudcord_shared::{AccountDeleted, Event, UserId};
use cloudcord_store::{FriendshipStore, GraphStore, Stores, User, UserStore};

use crate::error::ServiceError;
use crate::events::EventPublisher;

/// Upper bound on recommendations returned per query.
pub const MAX_RECOMMENDATIONS: usize = 3;

/// A friend-of-friend suggestion. Derived on every query, never stored.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Recommendation {
    pub user_id: UserId,
    pub display_name: String,
    pub mutual_friend_count: u32,
}

#[derive(Clone)]
pub struct SocialGraphService {
    users: Arc<dyn UserStore>,
    friendships: Arc<dyn FriendshipStore>,
    graph: Arc<dyn GraphStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl SocialGraphService {
    pub fn new(stores: &Stores, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            users: stores.users.clone(),
            friendships: stores.friendships.clone(),
            graph: stores.graph.clone(),
            publisher,
        }
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    /// Record for an externally authenticated identity, created on first use.
    pub async fn provision_user(
        &self,
        external_identity: &str,
        display_name: &str,
    ) -> Result<User, ServiceError> {
        let external_identity = external_identity.trim();
        if external_identity.is_empty() {
            return Err(ServiceError::InvalidInput("external_identity is required".into()));
        }
        let display_name = non_empty_name(display_name)?;

        Ok(self.users.provision_user(external_identity, display_name).await?)
    }

    pub async fn get_user(&self, id: UserId) -> Result<User, ServiceError> {
        self.users
            .get_user(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {id}")))
    }

    pub async fn get_user_by_external_identity(
        &self,
        external_identity: &str,
    ) -> Result<User, ServiceError> {
        self.users
            .get_user_by_external_identity(external_identity)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {external_identity}")))
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        Ok(self.users.list_users().await?)
    }

    pub async fn rename_user(&self, id: UserId, display_name: &str) -> Result<User, ServiceError> {
        let display_name = non_empty_name(display_name)?;
        if !self.users.rename_user(id, display_name).await? {
            return Err(ServiceError::NotFound(format!("user {id}")));
        }
        self.get_user(id).await
    }

    /// Remove the user and its friendships, drop its graph node, then
    /// announce the deletion so other services can purge their data.
    ///
    /// The event is published even when the graph write fails; that failure
    /// is still reported afterwards. Deleting an already-deleted user retries
    /// the graph removal before returning `NotFound`, so a repeated call
    /// clears a node left behind by an earlier failure.
    pub async fn delete_user(&self, id: UserId) -> Result<User, ServiceError> {
        let node = id.to_node_key();

        let Some(user) = self.users.delete_user(id).await? else {
            if self.graph.remove_node(&node).await? {
                info!(user_id = %id, "Removed stale graph node of deleted user");
            }
            return Err(ServiceError::NotFound(format!("user {id}")));
        };

        let mirror = self.graph.remove_node(&node).await;

        let event = Event::from(AccountDeleted {
            external_identity: user.external_identity.clone(),
        });
        if let Err(e) = self.publisher.publish(&event).await {
            warn!(user_id = %id, error = %e, "Failed to publish account deletion");
        }

        if let Err(e) = mirror {
            warn!(user_id = %id, error = %e, "Graph node removal failed");
            return Err(ServiceError::PartialWriteFailure(format!(
                "user {id} deleted but its graph node was not removed: {e}"
            )));
        }

        info!(user_id = %id, "User deleted");
        Ok(user)
    }

    // -----------------------------------------------------------------------
    // Friendships
    // -----------------------------------------------------------------------

    /// Make two users friends. Adding yourself, or an existing friend, is a
    /// silent no-op on the relational side.
    ///
    /// The graph mirror is written every time, so repeating the call heals
    /// an earlier failed mirror write.
    pub async fn add_friend(&self, user: UserId, friend: UserId) -> Result<(), ServiceError> {
        if user == friend {
            debug!(user_id = %user, "Ignoring self-friendship");
            return Ok(());
        }

        if self.friendships.friendship_exists(user, friend).await? {
            debug!(user_id = %user, friend_id = %friend, "Already friends");
        } else {
            self.friendships.insert_friendship(user, friend).await?;
            info!(user_id = %user, friend_id = %friend, "Friendship created");
        }

        self.graph
            .merge_friendship(&user.to_node_key(), &friend.to_node_key())
            .await
            .map_err(|e| {
                warn!(user_id = %user, friend_id = %friend, error = %e, "Graph mirror failed");
                ServiceError::PartialWriteFailure(format!(
                    "friendship {user}-{friend} stored but not mirrored to the graph: {e}"
                ))
            })
    }

    pub async fn are_friends(&self, user: UserId, other: UserId) -> Result<bool, ServiceError> {
        Ok(self.friendships.friendship_exists(user, other).await?)
    }

    pub async fn list_friends(&self, user: UserId) -> Result<Vec<UserId>, ServiceError> {
        self.get_user(user).await?;
        Ok(self.friendships.list_friends(user).await?)
    }

    /// Up to [`MAX_RECOMMENDATIONS`] friends-of-friends, most mutual friends
    /// first. Fails closed: a candidate missing from the user store fails
    /// the whole query.
    pub async fn get_recommendations(
        &self,
        user: UserId,
    ) -> Result<Vec<Recommendation>, ServiceError> {
        self.get_user(user).await?;

        let candidates = self.graph.friends_of_friends(&user.to_node_key()).await?;

        let mut picked = Vec::with_capacity(MAX_RECOMMENDATIONS);
        for candidate in candidates {
            if picked.len() == MAX_RECOMMENDATIONS {
                break;
            }
            let id: UserId = candidate.node.parse().map_err(|_| {
                ServiceError::NotFound(format!("graph node '{}' is not a user id", candidate.node))
            })?;
            if id == user || self.friendships.friendship_exists(user, id).await? {
                continue;
            }
            picked.push((id, candidate.mutual_friend_count));
        }

        let mut recommendations = Vec::with_capacity(picked.len());
        for (id, mutual_friend_count) in picked {
            let candidate = self.users.get_user(id).await?.ok_or_else(|| {
                ServiceError::NotFound(format!("recommended user {id}"))
            })?;
            recommendations.push(Recommendation {
                user_id: id,
                display_name: candidate.display_name,
                mutual_friend_count,
            });
        }

        debug!(user_id = %user, count = recommendations.len(), "Recommendations computed");
        Ok(recommendations)
    }
}

fn non_empty_name(display_name: &str) -> Result<&str, ServiceError> {
    let trimmed = display_name.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidInput("display_name is required".into()));
    }
    Ok(trimmed)
}
