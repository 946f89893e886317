//! [`FriendshipStore`] over the relational database.
//!
//! A friendship is two rows, `(a, b)` and `(b, a)`, written in one
//! transaction so either direction is a single-row lookup.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::params;

use cloudcord_shared::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::traits::FriendshipStore;

#[async_trait]
impl FriendshipStore for Database {
    async fn insert_friendship(&self, user: UserId, friend: UserId) -> Result<bool> {
        if user == friend {
            return Ok(false);
        }

        self.handle()
            .call(move |conn| {
                let tx = conn.transaction()?;

                let known: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM users WHERE id IN (?1, ?2)",
                    params![user.0, friend.0],
                    |row| row.get(0),
                )?;
                if known < 2 {
                    return Err(StoreError::NotFound(format!("user {user} or {friend}")));
                }

                let now = Utc::now().to_rfc3339();
                let inserted = tx.execute(
                    "INSERT OR IGNORE INTO friendships (user_id, friend_id, created_at)
                     VALUES (?1, ?2, ?3)",
                    params![user.0, friend.0, now],
                )?;
                tx.execute(
                    "INSERT OR IGNORE INTO friendships (user_id, friend_id, created_at)
                     VALUES (?1, ?2, ?3)",
                    params![friend.0, user.0, now],
                )?;
                tx.commit()?;

                Ok(inserted > 0)
            })
            .await
    }

    async fn friendship_exists(&self, user: UserId, other: UserId) -> Result<bool> {
        self.handle()
            .call(move |conn| {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(
                         SELECT 1 FROM friendships WHERE user_id = ?1 AND friend_id = ?2
                     )",
                    params![user.0, other.0],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
    }

    async fn list_friends(&self, user: UserId) -> Result<Vec<UserId>> {
        self.handle()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT friend_id FROM friendships
                     WHERE user_id = ?1
                     ORDER BY created_at ASC, friend_id ASC",
                )?;
                let rows = stmt.query_map(params![user.0], |row| row.get::<_, i64>(0))?;

                let mut friends = Vec::new();
                for row in rows {
                    friends.push(UserId(row?));
                }
                Ok(friends)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::UserStore;

    async fn db_with_users(n: usize) -> (Database, Vec<UserId>) {
        let db = Database::open_in_memory().unwrap();
        let mut ids = Vec::new();
        for i in 0..n {
            let user = db
                .provision_user(&format!("auth0|{i}"), &format!("user{i}"))
                .await
                .unwrap();
            ids.push(user.id);
        }
        (db, ids)
    }

    #[tokio::test]
    async fn insert_writes_both_directions() {
        let (db, ids) = db_with_users(2).await;

        assert!(db.insert_friendship(ids[0], ids[1]).await.unwrap());
        assert!(db.friendship_exists(ids[0], ids[1]).await.unwrap());
        assert!(db.friendship_exists(ids[1], ids[0]).await.unwrap());
        assert_eq!(db.list_friends(ids[1]).await.unwrap(), vec![ids[0]]);
    }

    #[tokio::test]
    async fn duplicate_insert_is_ignored() {
        let (db, ids) = db_with_users(2).await;

        assert!(db.insert_friendship(ids[0], ids[1]).await.unwrap());
        assert!(!db.insert_friendship(ids[0], ids[1]).await.unwrap());
        assert!(!db.insert_friendship(ids[1], ids[0]).await.unwrap());

        let rows: i64 = db
            .handle()
            .call(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM friendships", [], |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(rows, 2);
    }

    #[tokio::test]
    async fn self_friendship_is_a_no_op() {
        let (db, ids) = db_with_users(1).await;

        assert!(!db.insert_friendship(ids[0], ids[0]).await.unwrap());
        assert!(!db.friendship_exists(ids[0], ids[0]).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let (db, ids) = db_with_users(1).await;

        let err = db.insert_friendship(ids[0], UserId(404)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(db.list_friends(ids[0]).await.unwrap().is_empty());
    }
}
