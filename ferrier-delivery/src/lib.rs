//! Delivery engine for ferrier.
//!
//! Takes messages claimed from the queue and pushes them to their remote
//! mail exchangers: MX routing (with an optional smarthost relay), DKIM
//! signing, SMTP transmission with bounded timeouts, and exponential
//! retry backoff. A periodic [`Scheduler`] drives the whole pipeline, and
//! [`ConnectionRateLimiter`] guards the inbound side.

pub mod config;
pub mod dns;
pub mod error;
pub mod orchestrator;
pub mod rate_limiter;
pub mod retry;
pub mod scheduler;
pub mod signer;

pub use config::DeliveryConfig;
pub use dns::{MxLookup, MxResolver};
pub use error::DeliveryError;
pub use orchestrator::DeliveryOrchestrator;
pub use rate_limiter::{ConnectionRateLimiter, RateLimited};
pub use scheduler::Scheduler;
pub use signer::{MessageSigner, SigningOutcome};
