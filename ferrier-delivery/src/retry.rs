//! Exponential retry backoff.

use std::time::Duration;

/// Delay before the attempt following failure number `retry_count`.
///
/// `backoff_factor^retry_count` minutes: at the default factor of 2 the
/// sequence is 2, 4, 8, 16 minutes. Saturates rather than overflowing on
/// absurd counts.
#[must_use]
pub fn backoff_delay(backoff_factor: u32, retry_count: u32) -> Duration {
    let minutes = u64::from(backoff_factor).saturating_pow(retry_count);
    Duration::from_secs(minutes.saturating_mul(60))
}
