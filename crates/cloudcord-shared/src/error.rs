use thiserror::Error;

use crate::events::EventKind;

#[derive(Error, Debug)]
pub enum EventError {
    #[error("Failed to encode {kind} payload: {source}")]
    Encode {
        kind: EventKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to decode {kind} payload: {source}")]
    Decode {
        kind: EventKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("No event type is bound to queue '{0}'")]
    UnknownQueue(String),
}
