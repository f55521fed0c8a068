//! Delivery configuration, deserialized from the daemon's TOML file.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level delivery configuration.
///
/// Every section is optional in the file; missing values fall back to the
/// defaults documented on each field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryConfig {
    /// Smarthost relay. When present, all mail goes here instead of the
    /// recipient's mail exchangers.
    #[serde(default)]
    pub relay: Option<RelayConfig>,

    /// DKIM signing. When absent, messages are sent unsigned.
    #[serde(default)]
    pub dkim: Option<DkimConfig>,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub dns: DnsConfig,
}

/// Fixed next-hop relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    pub host: String,

    /// Submission port (default: 587).
    #[serde(default = "default_relay_port")]
    pub port: u16,
}

const fn default_relay_port() -> u16 {
    587
}

/// DKIM signing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DkimConfig {
    /// Signing domain (the `d=` tag).
    pub domain: String,

    /// Selector (the `s=` tag).
    pub selector: String,

    /// Path to the PKCS#1 RSA private key PEM.
    pub key_path: PathBuf,

    /// What to do with a message when signing fails.
    #[serde(default)]
    pub on_failure: SigningFailurePolicy,
}

/// Policy for messages whose DKIM signature cannot be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SigningFailurePolicy {
    /// Fail the delivery attempt; the message follows the retry path.
    #[default]
    Abort,
    /// Deliver the message unsigned, logging the deviation.
    SendUnsigned,
}

/// SMTP transport timeouts and identity.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// TCP connect timeout in seconds (default: 5).
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,

    /// Per-command read timeout in seconds (default: 10).
    #[serde(default = "default_read_secs")]
    pub read_secs: u64,

    /// Hostname announced in HELO (default: "localhost").
    #[serde(default = "default_helo_hostname")]
    pub helo_hostname: String,
}

const fn default_connect_secs() -> u64 {
    5
}

const fn default_read_secs() -> u64 {
    10
}

fn default_helo_hostname() -> String {
    "localhost".to_string()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_secs(),
            read_secs: default_read_secs(),
            helo_hostname: default_helo_hostname(),
        }
    }
}

/// Retry budget and backoff shape.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Failures before a message is abandoned (default: 5).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base of the exponential backoff, in minutes (default: 2, giving
    /// 2, 4, 8, 16 minute delays).
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: u32,
}

const fn default_max_retries() -> u32 {
    5
}

const fn default_backoff_factor() -> u32 {
    2
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

/// Scheduler cadence and claim sizing.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between queue sweeps (default: 10).
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,

    /// Maximum messages claimed per sweep (default: 10).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Seconds a message may stay `InProgress` before it is considered
    /// abandoned and requeued (default: 300).
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,
}

const fn default_period_secs() -> u64 {
    10
}

const fn default_batch_size() -> usize {
    10
}

const fn default_lease_secs() -> u64 {
    300
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period_secs: default_period_secs(),
            batch_size: default_batch_size(),
            lease_secs: default_lease_secs(),
        }
    }
}

/// Inbound per-IP connection rate limiting.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Connections admitted per IP per window (default: 20).
    #[serde(default = "default_max_per_window")]
    pub max_per_window: usize,

    /// Window length in seconds (default: 60).
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

const fn default_max_per_window() -> usize {
    20
}

const fn default_window_secs() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_per_window: default_max_per_window(),
            window_secs: default_window_secs(),
        }
    }
}

/// DNS resolver tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct DnsConfig {
    /// Query timeout in seconds (default: 5).
    #[serde(default = "default_dns_timeout_secs")]
    pub timeout_secs: u64,

    /// How long resolved exchanger lists stay cached (default: 300).
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

const fn default_dns_timeout_secs() -> u64 {
    5
}

const fn default_cache_ttl_secs() -> u64 {
    300
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_dns_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}
