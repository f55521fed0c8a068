use thiserror::Error;

/// Reasons a delivery attempt can fail.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// No mail exchanger could be determined for the recipient domain.
    #[error("no mail route for domain: {0}")]
    NoRoute(String),

    /// DKIM signing failed and policy forbids sending unsigned.
    #[error("DKIM signing failed: {0}")]
    SigningFailed(String),

    /// The SMTP exchange failed: connection, timeout, or server rejection.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The recipient address cannot be parsed. Never succeeds on retry.
    #[error("invalid recipient address: {0}")]
    InvalidAddress(String),

    /// The queue store rejected a read or write.
    #[error("queue store failure: {0}")]
    Store(#[from] ferrier_queue::QueueError),
}

impl DeliveryError {
    /// Whether retrying this failure can never succeed.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::InvalidAddress(_))
    }
}

impl From<ferrier_smtp::ClientError> for DeliveryError {
    fn from(e: ferrier_smtp::ClientError) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Specialized `Result` type for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_invalid_address_is_permanent() {
        assert!(DeliveryError::InvalidAddress("no-at-sign".to_string()).is_permanent());
        assert!(!DeliveryError::NoRoute("example.com".to_string()).is_permanent());
        assert!(!DeliveryError::SigningFailed("bad key".to_string()).is_permanent());
        assert!(!DeliveryError::Transport("timeout".to_string()).is_permanent());
    }
}
