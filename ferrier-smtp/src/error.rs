use thiserror::Error;

/// Errors produced by the SMTP client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed response: {0}")]
    Parse(String),

    #[error("connection closed by server")]
    ConnectionClosed,
}

impl From<std::str::Utf8Error> for ClientError {
    fn from(e: std::str::Utf8Error) -> Self {
        Self::Parse(format!("response is not valid UTF-8: {e}"))
    }
}

/// Specialized `Result` type for SMTP client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
