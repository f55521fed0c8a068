//! Outbound message queue for the ferrier delivery engine.
//!
//! This crate defines the unit of work ([`OutboundMessage`]), its status
//! state machine, and the [`QueueStore`] contract the scheduler drives:
//! atomic claim of due messages, status updates, and lease-expiry recovery
//! of messages abandoned mid-attempt.

mod error;
mod memory;
mod model;
mod store;

pub use error::{QueueError, Result};
pub use memory::MemoryQueueStore;
pub use model::{MessageId, MessagePayload, MessageStatus, NewMessage, OutboundMessage};
pub use store::QueueStore;
