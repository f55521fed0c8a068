//! MX resolution for outbound routing.
//!
//! Resolves the mail exchangers responsible for a recipient domain: MX
//! records only, ordered by ascending preference. Lookup failures and
//! empty answers both yield an empty list; the orchestrator treats that
//! as a transient no-route condition. Results are cached per domain in a
//! `DashMap` with a fixed TTL.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use hickory_resolver::{
    TokioResolver, config::ResolverOpts, name_server::TokioConnectionProvider,
};
use tracing::{debug, warn};

use crate::config::DnsConfig;

/// Routing seam between the orchestrator and DNS.
#[async_trait::async_trait]
pub trait MxLookup: Send + Sync + std::fmt::Debug {
    /// Mail exchanger hostnames for `domain`, best first. Empty means no
    /// route could be determined.
    async fn lookup(&self, domain: &str) -> Vec<String>;
}

#[derive(Debug, Clone)]
struct CachedRoute {
    exchangers: Vec<String>,
    expires_at: Instant,
}

/// Production [`MxLookup`] backed by hickory-resolver.
#[derive(Debug)]
pub struct MxResolver {
    resolver: TokioResolver,
    cache: DashMap<String, CachedRoute>,
    ttl: Duration,
}

impl MxResolver {
    /// Build a resolver from the system DNS configuration.
    ///
    /// # Errors
    ///
    /// Fails if the system resolver configuration cannot be loaded.
    pub fn new(config: &DnsConfig) -> Result<Self, hickory_resolver::ResolveError> {
        let mut opts = ResolverOpts::default();
        opts.timeout = Duration::from_secs(config.timeout_secs);

        let resolver = TokioResolver::builder(TokioConnectionProvider::default())?
            .with_options(opts)
            .build();

        Ok(Self {
            resolver,
            cache: DashMap::new(),
            ttl: Duration::from_secs(config.cache_ttl_secs),
        })
    }

    async fn resolve_uncached(&self, domain: &str) -> Vec<String> {
        match self.resolver.mx_lookup(domain).await {
            Ok(lookup) => {
                let mut records: Vec<(u16, String)> = lookup
                    .iter()
                    .map(|mx| (mx.preference(), mx.exchange().to_utf8()))
                    .collect();

                order_exchangers(&mut records)
            }
            Err(err) => {
                if err.is_no_records_found() {
                    debug!(domain, "No MX records");
                } else {
                    warn!(domain, error = %err, "MX lookup failed");
                }
                Vec::new()
            }
        }
    }
}

#[async_trait::async_trait]
impl MxLookup for MxResolver {
    async fn lookup(&self, domain: &str) -> Vec<String> {
        if let Some(cached) = self.cache.get(domain) {
            if cached.expires_at > Instant::now() {
                debug!(domain, "MX cache hit");
                return cached.exchangers.clone();
            }
        }

        let exchangers = self.resolve_uncached(domain).await;
        debug!(domain, count = exchangers.len(), "Resolved mail exchangers");

        self.cache.insert(
            domain.to_string(),
            CachedRoute {
                exchangers: exchangers.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );

        exchangers
    }
}

/// Sort `(preference, exchanger)` pairs ascending by preference and strip
/// the trailing root dot from each name.
fn order_exchangers(records: &mut Vec<(u16, String)>) -> Vec<String> {
    records.sort_by_key(|&(preference, _)| preference);
    records
        .drain(..)
        .map(|(_, host)| host.trim_end_matches('.').to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchangers_ordered_by_preference() {
        let mut records = vec![
            (10, "mx2.example.com.".to_string()),
            (5, "mx1.example.com.".to_string()),
            (20, "mx3.example.com.".to_string()),
        ];

        let ordered = order_exchangers(&mut records);

        assert_eq!(ordered, vec!["mx1.example.com", "mx2.example.com", "mx3.example.com"]);
    }

    #[test]
    fn trailing_dot_stripped() {
        let mut records = vec![(0, "mail.example.net.".to_string())];
        assert_eq!(order_exchangers(&mut records), vec!["mail.example.net"]);
    }

    #[tokio::test]
    #[ignore = "Requires network access"]
    async fn resolves_real_exchangers() {
        let resolver = MxResolver::new(&DnsConfig::default()).unwrap();
        let exchangers = resolver.lookup("gmail.com").await;

        assert!(!exchangers.is_empty());
        assert!(exchangers.iter().all(|host| !host.ends_with('.')));
    }

    #[tokio::test]
    #[ignore = "Requires network access"]
    async fn unknown_domain_yields_empty() {
        let resolver = MxResolver::new(&DnsConfig::default()).unwrap();
        let exchangers = resolver
            .lookup("this-domain-definitely-does-not-exist-12345.invalid")
            .await;

        assert!(exchangers.is_empty());
    }
}
