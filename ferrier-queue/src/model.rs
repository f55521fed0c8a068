//! The outbound message model and its status state machine.

use std::{fmt, time::SystemTime};

use serde::{Deserialize, Serialize};

/// Identifier for a queued message.
///
/// A ULID: globally unique, lexicographically sortable by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(ulid::Ulid);

impl MessageId {
    /// Generate a new unique message ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(ulid::Ulid::new())
    }

    /// The underlying ULID.
    #[must_use]
    pub const fn ulid(&self) -> ulid::Ulid {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for MessageId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let id = ulid::Ulid::from_string(&s).map_err(serde::de::Error::custom)?;
        Ok(Self(id))
    }
}

/// Delivery status of an outbound message.
///
/// `Pending → InProgress → {Sent | Retry | Failed}`; `Retry` becomes
/// claimable again once its `next_retry_at` elapses. `Sent` and `Failed`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    /// Awaiting the first delivery attempt.
    Pending,
    /// Claimed by exactly one orchestrator invocation.
    InProgress,
    /// Delivered; terminal.
    Sent,
    /// A previous attempt failed; claimable once `next_retry_at` elapses.
    Retry,
    /// Given up; terminal.
    Failed,
}

impl MessageStatus {
    /// Whether a message in this status may be claimed when due.
    #[must_use]
    pub const fn is_claimable(self) -> bool {
        matches!(self, Self::Pending | Self::Retry)
    }

    /// Whether this status is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }
}

/// Message body as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessagePayload {
    /// Already MIME-formed message bytes (headers + body), pre-signing.
    Raw(Vec<u8>),
    /// A synthesized message; headers are rendered at delivery time.
    Draft { subject: String, body: String },
}

impl MessagePayload {
    /// Render the payload to RFC 5322 message bytes with CRLF line endings.
    ///
    /// Raw payloads pass through untouched. Drafts get From/To/Subject/Date
    /// and a Message-ID derived from the queue ID and the sender domain.
    #[must_use]
    pub fn render(&self, id: &MessageId, sender: &str, recipient: &str) -> Vec<u8> {
        match self {
            Self::Raw(bytes) => bytes.clone(),
            Self::Draft { subject, body } => {
                let date = chrono::Utc::now().to_rfc2822();
                let host = sender.rsplit_once('@').map_or("localhost", |(_, d)| d);
                let body = body.lines().collect::<Vec<_>>().join("\r\n");
                format!(
                    "From: {sender}\r\nTo: {recipient}\r\nSubject: {subject}\r\n\
                     Date: {date}\r\nMessage-ID: <{id}@{host}>\r\n\r\n{body}\r\n"
                )
                .into_bytes()
            }
        }
    }
}

/// A message submitted for delivery, before the store assigns its identity.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender: String,
    pub recipient: String,
    pub payload: MessagePayload,
}

/// The unit of work: one message awaiting transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Store-assigned identity.
    pub id: MessageId,
    /// Envelope sender address.
    pub sender: String,
    /// Envelope recipient address.
    pub recipient: String,
    /// Message body.
    pub payload: MessagePayload,
    /// Current delivery status.
    pub status: MessageStatus,
    /// Number of failed delivery attempts so far.
    pub retry_count: u32,
    /// Earliest time the message is eligible for a delivery attempt.
    pub next_retry_at: SystemTime,
    /// Reason for the last failure; cleared on success.
    pub error_message: Option<String>,
    /// When the message was enqueued.
    pub created_at: SystemTime,
    /// When the message was last modified.
    pub updated_at: SystemTime,
}

impl OutboundMessage {
    /// Build a freshly enqueued message: `Pending`, zero retries, due now.
    #[must_use]
    pub fn new(id: MessageId, message: NewMessage, now: SystemTime) -> Self {
        Self {
            id,
            sender: message.sender,
            recipient: message.recipient,
            payload: message.payload,
            status: MessageStatus::Pending,
            retry_count: 0,
            next_retry_at: now,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a successful delivery. Clears the error message.
    pub fn mark_sent(&mut self, now: SystemTime) {
        self.status = MessageStatus::Sent;
        self.error_message = None;
        self.updated_at = now;
    }

    /// Record a failed attempt that will be retried at `next_retry_at`.
    pub fn schedule_retry(&mut self, error: String, next_retry_at: SystemTime, now: SystemTime) {
        self.retry_count += 1;
        self.status = MessageStatus::Retry;
        self.next_retry_at = next_retry_at;
        self.error_message = Some(error);
        self.updated_at = now;
    }

    /// Record a failed attempt that exhausted the retry budget.
    pub fn mark_exhausted(&mut self, error: String, now: SystemTime) {
        self.retry_count += 1;
        self.status = MessageStatus::Failed;
        self.error_message = Some(error);
        self.updated_at = now;
    }

    /// Fail the message permanently without consuming a retry. Used for
    /// conditions that cannot succeed on resubmission, such as a malformed
    /// recipient address.
    pub fn mark_unroutable(&mut self, error: String, now: SystemTime) {
        self.status = MessageStatus::Failed;
        self.error_message = Some(error);
        self.updated_at = now;
    }
}
