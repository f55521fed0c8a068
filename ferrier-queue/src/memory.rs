use std::{
    collections::HashMap,
    sync::RwLock,
    time::{Duration, SystemTime},
};

use crate::{
    MessageId, MessageStatus, NewMessage, OutboundMessage, QueueError, QueueStore, Result,
};

/// In-memory [`QueueStore`] backed by a single [`RwLock`].
///
/// Claiming holds the write guard for the whole select-and-mark step, so two
/// schedulers racing over the same due set always receive disjoint messages.
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    messages: RwLock<HashMap<MessageId, OutboundMessage>>,
}

impl MemoryQueueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl QueueStore for MemoryQueueStore {
    async fn enqueue(&self, message: NewMessage) -> Result<MessageId> {
        let id = MessageId::generate();
        let message = OutboundMessage::new(id, message, SystemTime::now());

        tracing::debug!(id = %id, recipient = message.recipient, "Enqueued message");

        self.messages.write()?.insert(id, message);

        Ok(id)
    }

    async fn claim_due(&self, max: usize, now: SystemTime) -> Result<Vec<OutboundMessage>> {
        let mut messages = self.messages.write()?;

        let mut due: Vec<(MessageId, SystemTime)> = messages
            .values()
            .filter(|m| m.status.is_claimable() && m.next_retry_at <= now)
            .map(|m| (m.id, m.next_retry_at))
            .collect();

        due.sort_by_key(|&(_, at)| at);
        due.truncate(max);

        let mut claimed = Vec::with_capacity(due.len());
        for (id, _) in due {
            if let Some(message) = messages.get_mut(&id) {
                message.status = MessageStatus::InProgress;
                message.updated_at = now;
                claimed.push(message.clone());
            }
        }

        Ok(claimed)
    }

    async fn update(&self, message: &OutboundMessage) -> Result<()> {
        let mut messages = self.messages.write()?;

        if !messages.contains_key(&message.id) {
            return Err(QueueError::NotFound(message.id));
        }

        messages.insert(message.id, message.clone());

        Ok(())
    }

    async fn get(&self, id: &MessageId) -> Result<OutboundMessage> {
        self.messages
            .read()?
            .get(id)
            .cloned()
            .ok_or(QueueError::NotFound(*id))
    }

    async fn recover_stale(&self, lease: Duration, now: SystemTime) -> Result<usize> {
        let mut messages = self.messages.write()?;

        let mut recovered = 0;
        for message in messages.values_mut() {
            let expired = message.status == MessageStatus::InProgress
                && now
                    .duration_since(message.updated_at)
                    .is_ok_and(|held| held > lease);

            if expired {
                tracing::warn!(id = %message.id, "Recovering message with expired lease");
                message.status = MessageStatus::Retry;
                message.next_retry_at = now;
                message.updated_at = now;
                recovered += 1;
            }
        }

        Ok(recovered)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.messages.read()?.len())
    }
}
