//! [`UserStore`] over the relational database.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use cloudcord_shared::UserId;

use crate::database::{parse_timestamp, Database};
use crate::error::Result;
use crate::models::User;
use crate::traits::UserStore;

const SELECT_USER: &str = "SELECT id, external_identity, display_name, created_at FROM users";

#[async_trait]
impl UserStore for Database {
    async fn provision_user(&self, external_identity: &str, display_name: &str) -> Result<User> {
        let external_identity = external_identity.to_string();
        let display_name = display_name.to_string();
        self.handle()
            .call(move |conn| {
                let inserted = conn.execute(
                    "INSERT INTO users (external_identity, display_name, created_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(external_identity) DO NOTHING",
                    params![external_identity, display_name, Utc::now().to_rfc3339()],
                )?;

                let user = conn.query_row(
                    &format!("{SELECT_USER} WHERE external_identity = ?1"),
                    params![external_identity],
                    row_to_user,
                )?;

                if inserted > 0 {
                    tracing::info!(user_id = %user.id, "user provisioned");
                }
                Ok(user)
            })
            .await
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.handle()
            .call(move |conn| {
                let user = conn
                    .query_row(
                        &format!("{SELECT_USER} WHERE id = ?1"),
                        params![id.0],
                        row_to_user,
                    )
                    .optional()?;
                Ok(user)
            })
            .await
    }

    async fn get_user_by_external_identity(
        &self,
        external_identity: &str,
    ) -> Result<Option<User>> {
        let external_identity = external_identity.to_string();
        self.handle()
            .call(move |conn| {
                let user = conn
                    .query_row(
                        &format!("{SELECT_USER} WHERE external_identity = ?1"),
                        params![external_identity],
                        row_to_user,
                    )
                    .optional()?;
                Ok(user)
            })
            .await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.handle()
            .call(|conn| {
                let mut stmt = conn.prepare(&format!("{SELECT_USER} ORDER BY id ASC"))?;
                let rows = stmt.query_map([], row_to_user)?;

                let mut users = Vec::new();
                for row in rows {
                    users.push(row?);
                }
                Ok(users)
            })
            .await
    }

    async fn rename_user(&self, id: UserId, display_name: &str) -> Result<bool> {
        let display_name = display_name.to_string();
        self.handle()
            .call(move |conn| {
                let affected = conn.execute(
                    "UPDATE users SET display_name = ?2 WHERE id = ?1",
                    params![id.0, display_name],
                )?;
                Ok(affected > 0)
            })
            .await
    }

    async fn delete_user(&self, id: UserId) -> Result<Option<User>> {
        self.handle()
            .call(move |conn| {
                let tx = conn.transaction()?;

                let Some(user) = tx
                    .query_row(
                        &format!("{SELECT_USER} WHERE id = ?1"),
                        params![id.0],
                        row_to_user,
                    )
                    .optional()?
                else {
                    return Ok(None);
                };

                let edges = tx.execute(
                    "DELETE FROM friendships WHERE user_id = ?1 OR friend_id = ?1",
                    params![id.0],
                )?;
                tx.execute("DELETE FROM users WHERE id = ?1", params![id.0])?;
                tx.commit()?;

                tracing::info!(user_id = %id, friendship_rows = edges, "user deleted");
                Ok(Some(user))
            })
            .await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id: i64 = row.get(0)?;
    let created_str: String = row.get(3)?;

    Ok(User {
        id: UserId(id),
        external_identity: row.get(1)?,
        display_name: row.get(2)?,
        created_at: parse_timestamp(3, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::FriendshipStore;

    #[tokio::test]
    async fn provision_is_idempotent_per_identity() {
        let db = Database::open_in_memory().unwrap();

        let first = db.provision_user("auth0|alice", "alice").await.unwrap();
        let again = db.provision_user("auth0|alice", "someone else").await.unwrap();
        assert_eq!(first, again);
        assert_eq!(again.display_name, "alice");

        let bob = db.provision_user("auth0|bob", "bob").await.unwrap();
        assert_ne!(first.id, bob.id);
        assert_eq!(db.list_users().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn lookups_by_id_and_identity() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.provision_user("auth0|alice", "alice").await.unwrap();

        assert_eq!(db.get_user(alice.id).await.unwrap(), Some(alice.clone()));
        assert_eq!(
            db.get_user_by_external_identity("auth0|alice").await.unwrap(),
            Some(alice)
        );
        assert_eq!(db.get_user(UserId(999)).await.unwrap(), None);
        assert_eq!(
            db.get_user_by_external_identity("auth0|nobody").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn rename_changes_display_name_only() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.provision_user("auth0|alice", "alice").await.unwrap();

        assert!(db.rename_user(alice.id, "Alice L.").await.unwrap());
        assert!(!db.rename_user(UserId(999), "ghost").await.unwrap());

        let renamed = db.get_user(alice.id).await.unwrap().unwrap();
        assert_eq!(renamed.display_name, "Alice L.");
        assert_eq!(renamed.external_identity, "auth0|alice");
    }

    #[tokio::test]
    async fn delete_removes_user_and_edges() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.provision_user("auth0|alice", "alice").await.unwrap();
        let bob = db.provision_user("auth0|bob", "bob").await.unwrap();
        db.insert_friendship(alice.id, bob.id).await.unwrap();

        let removed = db.delete_user(alice.id).await.unwrap();
        assert_eq!(removed.map(|u| u.external_identity).as_deref(), Some("auth0|alice"));
        assert!(!db.friendship_exists(bob.id, alice.id).await.unwrap());
        assert!(db.list_friends(bob.id).await.unwrap().is_empty());

        assert_eq!(db.delete_user(alice.id).await.unwrap(), None);
    }
}
