//! Payload contracts carried over the event channel.
//!
//! Each event type travels on its own queue as a bare JSON object; the queue
//! a delivery arrived on decides how its body is decoded.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EventError;

/// Sent to the receiver of every persisted message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageNotification {
    pub receiver_id: String,
    pub message: String,
}

impl MessageNotification {
    pub fn new_message(sender: &str, receiver: &str) -> Self {
        Self {
            receiver_id: receiver.to_string(),
            message: format!("{sender} sent a new message"),
        }
    }
}

/// Published once a user record has been removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountDeleted {
    pub external_identity: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MessageNotification,
    AccountDeleted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::MessageNotification => "message-notification",
            EventKind::AccountDeleted => "account-deleted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of events the services exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    MessageNotification(MessageNotification),
    AccountDeleted(AccountDeleted),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::MessageNotification(_) => EventKind::MessageNotification,
            Event::AccountDeleted(_) => EventKind::AccountDeleted,
        }
    }

    /// Serialize the payload (without any type tag) to JSON.
    pub fn to_payload(&self) -> Result<Vec<u8>, EventError> {
        let encoded = match self {
            Event::MessageNotification(inner) => serde_json::to_vec(inner),
            Event::AccountDeleted(inner) => serde_json::to_vec(inner),
        };
        encoded.map_err(|source| EventError::Encode {
            kind: self.kind(),
            source,
        })
    }

    /// Decode a payload received on the queue bound to `kind`.
    pub fn from_payload(kind: EventKind, body: &[u8]) -> Result<Self, EventError> {
        let decoded = match kind {
            EventKind::MessageNotification => {
                serde_json::from_slice(body).map(Event::MessageNotification)
            }
            EventKind::AccountDeleted => serde_json::from_slice(body).map(Event::AccountDeleted),
        };
        decoded.map_err(|source| EventError::Decode { kind, source })
    }
}

impl From<MessageNotification> for Event {
    fn from(value: MessageNotification) -> Self {
        Event::MessageNotification(value)
    }
}

impl From<AccountDeleted> for Event {
    fn from(value: AccountDeleted) -> Self {
        Event::AccountDeleted(value)
    }
}
