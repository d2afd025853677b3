//! Error taxonomy for the event bus (§4.7).

use thiserror::Error;

pub type EventResult<T> = std::result::Result<T, EventError>;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("unknown subscriber: {0}")]
    UnknownSubscriber(String),

    #[error("bus is shutting down")]
    ShuttingDown,
}

impl From<EventError> for claude_slack_core::Error {
    fn from(e: EventError) -> Self {
        match e {
            EventError::UnknownSubscriber(s) => Self::NotFound(s),
            EventError::ShuttingDown => Self::Unavailable("event bus shutting down".to_string()),
        }
    }
}
