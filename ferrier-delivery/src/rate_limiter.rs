//! Inbound per-IP connection rate limiting.
//!
//! Sliding-window limiter: each IP gets a chronological record of its
//! recent connection instants, and a connection is rejected when more
//! than the configured maximum fall inside the trailing window. Windows
//! live in a `DashMap` so limiting one IP never blocks another.

use std::{
    collections::VecDeque,
    net::IpAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use dashmap::DashMap;
use thiserror::Error;

use crate::config::RateLimitConfig;

/// Rejection issued to an over-limit connection.
///
/// Carries the SMTP reply the listener should write before closing.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{code} too many connections from {ip}, try again later")]
pub struct RateLimited {
    pub code: u16,
    pub ip: IpAddr,
}

/// Checks between idle-window sweeps.
const SWEEP_INTERVAL: usize = 1024;

/// Sliding-window connection limiter keyed by remote IP.
#[derive(Debug)]
pub struct ConnectionRateLimiter {
    windows: DashMap<IpAddr, Arc<parking_lot::Mutex<VecDeque<Instant>>>>,
    max_per_window: usize,
    window: Duration,
    checks: AtomicUsize,
}

impl ConnectionRateLimiter {
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            max_per_window: config.max_per_window,
            window: Duration::from_secs(config.window_secs),
            checks: AtomicUsize::new(0),
        }
    }

    /// Record a connection attempt from `ip` and decide its fate.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimited`] when the attempt is the `max + 1`th within
    /// the trailing window. Rejected attempts still count against the
    /// window.
    pub fn check(&self, ip: IpAddr) -> Result<(), RateLimited> {
        self.check_at(ip, Instant::now())
    }

    /// Drop windows whose last connection is older than the window, so
    /// long-gone IPs do not accumulate map entries.
    pub fn evict_idle(&self) {
        self.evict_idle_at(Instant::now());
    }

    /// Number of IPs currently tracked.
    #[must_use]
    pub fn tracked_ips(&self) -> usize {
        self.windows.len()
    }

    fn evict_idle_at(&self, now: Instant) {
        self.windows.retain(|_, window| {
            window
                .lock()
                .back()
                .is_some_and(|&last| now.duration_since(last) <= self.window)
        });
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), RateLimited> {
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.evict_idle_at(now);
        }

        let window = self
            .windows
            .entry(ip)
            .or_insert_with(|| Arc::new(parking_lot::Mutex::new(VecDeque::new())))
            .clone();

        let mut window = window.lock();
        window.push_back(now);

        // Entries are chronological, so pruning stops at the first one
        // still inside the window.
        while let Some(&oldest) = window.front() {
            if now.duration_since(oldest) > self.window {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() > self.max_per_window {
            tracing::debug!(%ip, in_window = window.len(), "Connection rate limited");
            return Err(RateLimited { code: 421, ip });
        }

        Ok(())
    }
}
