//! # cloudcord-shared
//!
//! Types shared by the cloudcord store and services: user identifiers, the
//! canonical conversation pair key, and the JSON payload contracts carried
//! over the event channel.

pub mod error;
pub mod events;
pub mod types;

pub use error::EventError;
pub use events::{AccountDeleted, Event, EventKind, MessageNotification};
pub use types::{PairKey, UserId};
