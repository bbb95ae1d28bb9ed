//! Error taxonomy for queue publishing.
//!
//! Every failure a publish can hit falls into one of four categories. Errors
//! are never recovered locally; they propagate to the caller unchanged.

use thiserror::Error;

/// Result alias used by the queue module.
pub type Result<T> = std::result::Result<T, PublishError>;

/// A failed publish, classified by what went wrong.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The broker endpoint is malformed, unreachable, or rejected the credentials.
    #[error("connection error: {0}")]
    Connection(String),

    /// The destination queue does not exist on the broker.
    #[error("queue not found: {0}")]
    NotFound(String),

    /// The payload could not be encoded as text.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The send failed in transit after a connection was established.
    #[error("transport error: {0}")]
    Transport(String),
}

impl PublishError {
    /// Short category name, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            PublishError::Connection(_) => "connection",
            PublishError::NotFound(_) => "not_found",
            PublishError::Serialization(_) => "serialization",
            PublishError::Transport(_) => "transport",
        }
    }
}

impl From<serde_json::Error> for PublishError {
    fn from(e: serde_json::Error) -> Self {
        PublishError::Serialization(e.to_string())
    }
}
