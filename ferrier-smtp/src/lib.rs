//! A minimal SMTP client for outbound delivery.
//!
//! Supports exactly the command sequence a relaying MTA needs: greeting,
//! `HELO`/`EHLO`, `MAIL FROM`, `RCPT TO`, `DATA`, and `QUIT`, over plain
//! TCP.

mod client;
mod error;
mod response;

pub use client::SmtpClient;
pub use error::{ClientError, Result};
pub use response::Response;
