//! Document store for conversations.
//!
//! One row per canonical pair; the `document` column holds the JSON
//! `{pair_key, messages}` document. Appends go through a single
//! `INSERT ... ON CONFLICT DO UPDATE` so the find-or-create and the append
//! are one atomic statement.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use cloudcord_shared::PairKey;

use crate::database::SqliteHandle;
use crate::error::{Result, StoreError};
use crate::migrations;
use crate::models::{Conversation, Message};
use crate::traits::{ConversationStore, Store};

pub struct ConversationDb {
    handle: SqliteHandle,
    path: Option<PathBuf>,
}

impl ConversationDb {
    pub fn open_at(path: &Path) -> Result<Self> {
        Ok(Self {
            handle: SqliteHandle::open(path, "documents", migrations::DOCUMENTS)?,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            handle: SqliteHandle::open_in_memory("documents", migrations::DOCUMENTS)?,
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[async_trait]
impl Store for ConversationDb {
    fn name(&self) -> &'static str {
        "sqlite-documents"
    }

    async fn health_check(&self) -> Result<()> {
        self.handle.health_check().await
    }

    async fn close(&self) -> Result<()> {
        self.handle.close().await
    }
}

#[async_trait]
impl ConversationStore for ConversationDb {
    async fn append_message(&self, key: &PairKey, message: &Message) -> Result<()> {
        let seeded = serde_json::to_string(&Conversation::seeded(key.clone(), message.clone()))?;
        let message = serde_json::to_string(message)?;
        let key = key.clone();

        self.handle
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO conversations (user_low, user_high, document)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(user_low, user_high) DO UPDATE
                     SET document = json_insert(document, '$.messages[#]', json(?4))",
                    params![key.low(), key.high(), seeded, message],
                )?;
                tracing::debug!(pair_key = %key, "message appended");
                Ok(())
            })
            .await
    }

    async fn find_conversation(&self, key: &PairKey) -> Result<Option<Conversation>> {
        let key = key.clone();
        self.handle
            .call(move |conn| read_document(conn, &key))
            .await
    }

    async fn create_conversation(&self, key: &PairKey) -> Result<Conversation> {
        let empty = serde_json::to_string(&Conversation::empty(key.clone()))?;
        let key = key.clone();

        self.handle
            .call(move |conn| {
                let inserted = conn.execute(
                    "INSERT INTO conversations (user_low, user_high, document)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(user_low, user_high) DO NOTHING",
                    params![key.low(), key.high(), empty],
                )?;
                if inserted > 0 {
                    tracing::debug!(pair_key = %key, "conversation created");
                }

                read_document(conn, &key)?.ok_or_else(|| {
                    StoreError::NotFound(format!("conversation {key} vanished after create"))
                })
            })
            .await
    }

    async fn delete_conversations_for(&self, participant: &str) -> Result<u64> {
        let participant = participant.to_string();
        self.handle
            .call(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM conversations WHERE user_low = ?1 OR user_high = ?1",
                    params![participant],
                )?;
                Ok(removed as u64)
            })
            .await
    }
}

fn read_document(conn: &rusqlite::Connection, key: &PairKey) -> Result<Option<Conversation>> {
    let document: Option<String> = conn
        .query_row(
            "SELECT document FROM conversations WHERE user_low = ?1 AND user_high = ?2",
            params![key.low(), key.high()],
            |row| row.get(0),
        )
        .optional()?;

    match document {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn first_message_creates_document() {
        let db = ConversationDb::open_in_memory().unwrap();
        let key = PairKey::new("B", "A");

        db.append_message(&key, &Message::new("A", "hello")).await.unwrap();

        let conversation = db.find_conversation(&key).await.unwrap().unwrap();
        assert_eq!(conversation.pair_key.low(), "A");
        assert_eq!(conversation.pair_key.high(), "B");
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(conversation.messages[0].content, "hello");
        assert_eq!(conversation.messages[0].sent_by_user, "A");
    }

    #[tokio::test]
    async fn appends_keep_insertion_order() {
        let db = ConversationDb::open_in_memory().unwrap();
        let key = PairKey::new("A", "B");

        for (sender, text) in [("A", "one"), ("B", "two"), ("A", "three")] {
            db.append_message(&key, &Message::new(sender, text)).await.unwrap();
        }

        let conversation = db.find_conversation(&PairKey::new("B", "A")).await.unwrap().unwrap();
        let contents: Vec<_> = conversation.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["one", "two", "three"]);
    }

    #[tokio::test]
    async fn document_shape_on_disk() {
        let db = ConversationDb::open_in_memory().unwrap();
        let key = PairKey::new("B", "A");
        db.append_message(&key, &Message::new("A", "hello")).await.unwrap();

        let raw: String = db
            .handle
            .call(|conn| {
                Ok(conn.query_row("SELECT document FROM conversations", [], |row| row.get(0))?)
            })
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["pair_key"], serde_json::json!(["A", "B"]));
        assert_eq!(value["messages"][0]["sent_by_user"], "A");
        assert!(value["messages"][0]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn concurrent_first_messages_share_one_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversations.db");
        // Two handles mean two SQLite connections racing on the same file.
        let left = Arc::new(ConversationDb::open_at(&path).unwrap());
        let right = Arc::new(ConversationDb::open_at(&path).unwrap());
        let key = PairKey::new("A", "B");

        let mut tasks = Vec::new();
        for i in 0..10 {
            for (db, sender) in [(&left, "A"), (&right, "B")] {
                let db = Arc::clone(db);
                let key = key.clone();
                tasks.push(tokio::spawn(async move {
                    db.append_message(&key, &Message::new(sender, &format!("{sender}{i}")))
                        .await
                }));
            }
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let rows: i64 = left
            .handle
            .call(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let conversation = right.find_conversation(&key).await.unwrap().unwrap();
        assert_eq!(conversation.messages.len(), 20);
        for sender in ["A", "B"] {
            let sent = conversation
                .messages
                .iter()
                .filter(|m| m.sent_by_user == sender)
                .count();
            assert_eq!(sent, 10);
        }
    }

    #[tokio::test]
    async fn create_returns_existing_conversation() {
        let db = ConversationDb::open_in_memory().unwrap();
        let key = PairKey::new("A", "B");

        let created = db.create_conversation(&key).await.unwrap();
        assert!(created.messages.is_empty());

        db.append_message(&key, &Message::new("A", "hello")).await.unwrap();
        let again = db.create_conversation(&key).await.unwrap();
        assert_eq!(again.messages.len(), 1);
    }

    #[tokio::test]
    async fn delete_for_participant_is_idempotent() {
        let db = ConversationDb::open_in_memory().unwrap();
        db.append_message(&PairKey::new("A", "B"), &Message::new("A", "1")).await.unwrap();
        db.append_message(&PairKey::new("C", "A"), &Message::new("C", "2")).await.unwrap();
        db.append_message(&PairKey::new("B", "C"), &Message::new("B", "3")).await.unwrap();

        assert_eq!(db.delete_conversations_for("A").await.unwrap(), 2);
        assert_eq!(db.delete_conversations_for("A").await.unwrap(), 0);
        assert!(db.find_conversation(&PairKey::new("B", "C")).await.unwrap().is_some());
        assert!(db.find_conversation(&PairKey::new("A", "B")).await.unwrap().is_none());
    }
}
