//! Error types for the environment abstraction.

use thiserror::Error;

/// Errors that can occur at the environment boundary.
#[derive(Debug, Error)]
pub enum EnvError {
    /// A sensor feed is gone (transport closed, consumer shut down)
    #[error("Feed closed: {0}")]
    FeedClosed(String),

    /// Publication buffer is full (slow downstream consumer)
    #[error("Publish buffer full: {0}")]
    PublishOverflow(String),

    /// Event serialization failed
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Context operation failed
    #[error("Context error: {0}")]
    ContextError(String),

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a feed-closed error.
    pub fn feed_closed(msg: impl Into<String>) -> Self {
        Self::FeedClosed(msg.into())
    }

    /// Creates a publish-overflow error.
    pub fn overflow(msg: impl Into<String>) -> Self {
        Self::PublishOverflow(msg.into())
    }
}
