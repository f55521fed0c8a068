use thiserror::Error;

use crate::MessageId;

/// Errors returned by queue store operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Message not found in the store.
    #[error("message not found: {0}")]
    NotFound(MessageId),

    /// Internal store error (lock poisoning, backend failure).
    #[error("internal queue error: {0}")]
    Internal(String),
}

/// Specialized `Result` type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

impl<T> From<std::sync::PoisonError<T>> for QueueError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("lock poisoned: {e}"))
    }
}
