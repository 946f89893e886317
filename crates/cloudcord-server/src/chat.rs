//! Conversation service: canonical-pair addressing over the document store.

use std::sync::Arc;

use tracing::{debug, info, warn};

use cloudcord_shared::{Event, MessageNotification, PairKey};
use cloudcord_store::{Conversation, ConversationStore, Message};

use crate::error::ServiceError;
use crate::events::EventPublisher;

#[derive(Clone)]
pub struct ConversationService {
    store: Arc<dyn ConversationStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl ConversationService {
    pub fn new(store: Arc<dyn ConversationStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { store, publisher }
    }

    /// Append a message to the pair's conversation, creating it if needed,
    /// then notify the receiver. A failed notification does not fail the send.
    pub async fn send_message(
        &self,
        sender: &str,
        receiver: &str,
        content: &str,
    ) -> Result<(), ServiceError> {
        let key = pair_key(sender, receiver)?;
        let message = Message::new(sender, content);

        self.store.append_message(&key, &message).await?;
        debug!(pair_key = %key, "Message stored");

        let event = Event::from(MessageNotification::new_message(sender, receiver));
        if let Err(e) = self.publisher.publish(&event).await {
            warn!(receiver = %receiver, error = %e, "Failed to publish message notification");
        }

        Ok(())
    }

    pub async fn get_conversation(&self, a: &str, b: &str) -> Result<Conversation, ServiceError> {
        let key = pair_key(a, b)?;
        self.store
            .find_conversation(&key)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("conversation {key}")))
    }

    /// Create an empty conversation, or return the one another writer
    /// created first.
    pub async fn create_conversation(&self, a: &str, b: &str) -> Result<Conversation, ServiceError> {
        let key = pair_key(a, b)?;
        Ok(self.store.create_conversation(&key).await?)
    }

    /// Read policy of the HTTP surface: a missing conversation is created.
    pub async fn get_or_create(&self, a: &str, b: &str) -> Result<Conversation, ServiceError> {
        match self.get_conversation(a, b).await {
            Err(ServiceError::NotFound(_)) => self.create_conversation(a, b).await,
            other => other,
        }
    }

    /// Remove every conversation `participant` is part of. Idempotent.
    pub async fn purge_participant(&self, participant: &str) -> Result<u64, ServiceError> {
        let removed = self.store.delete_conversations_for(participant).await?;
        info!(participant = %participant, removed, "Conversations purged");
        Ok(removed)
    }
}

fn pair_key(a: &str, b: &str) -> Result<PairKey, ServiceError> {
    if a.trim().is_empty() || b.trim().is_empty() {
        return Err(ServiceError::InvalidInput(
            "both participants are required".into(),
        ));
    }
    if a == b {
        return Err(ServiceError::InvalidInput(
            "a conversation needs two distinct participants".into(),
        ));
    }
    Ok(PairKey::new(a, b))
}
