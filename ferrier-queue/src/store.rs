use std::time::{Duration, SystemTime};

use crate::{MessageId, NewMessage, OutboundMessage, Result};

/// Storage contract for the outbound queue.
///
/// Implementations must make [`claim_due`](QueueStore::claim_due) atomic:
/// concurrent callers never receive the same message, and every claimed
/// message is `InProgress` before the call returns.
#[async_trait::async_trait]
pub trait QueueStore: Send + Sync + std::fmt::Debug {
    /// Persist a new message as `Pending`, due immediately.
    async fn enqueue(&self, message: NewMessage) -> Result<MessageId>;

    /// Atomically claim up to `max` due messages.
    ///
    /// A message is due when its status is `Pending` or `Retry` and its
    /// `next_retry_at` is at or before `now`. Claimed messages are returned
    /// in ascending `next_retry_at` order and transition to `InProgress`.
    async fn claim_due(&self, max: usize, now: SystemTime) -> Result<Vec<OutboundMessage>>;

    /// Persist the current state of a previously claimed message.
    async fn update(&self, message: &OutboundMessage) -> Result<()>;

    /// Fetch a message by ID.
    async fn get(&self, id: &MessageId) -> Result<OutboundMessage>;

    /// Return `InProgress` messages whose lease has expired to `Retry`.
    ///
    /// A message's lease expires when it has been `InProgress` for longer
    /// than `lease` as of `now`. Returns the number of messages recovered.
    async fn recover_stale(&self, lease: Duration, now: SystemTime) -> Result<usize>;

    /// Number of messages in the store, regardless of status.
    async fn len(&self) -> Result<usize>;

    /// Whether the store holds no messages.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}
