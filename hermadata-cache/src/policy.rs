//! TTL and retention policy, configurable per key prefix.

use std::collections::HashMap;
use std::time::Duration;

/// Per-prefix staleness and eviction policy.
///
/// The TTL decides when a successful fetch becomes stale; the retention
/// window decides how long an unreferenced entry survives before eviction.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    default_ttl: Option<Duration>,
    ttl_overrides: HashMap<String, Option<Duration>>,
    default_retention: Duration,
    retention_overrides: HashMap<String, Duration>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            // finite default so nothing is immortal by accident
            default_ttl: Some(Duration::from_secs(60)),
            ttl_overrides: HashMap::new(),
            default_retention: Duration::ZERO,
            retention_overrides: HashMap::new(),
        }
    }
}

impl CachePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the TTL applied to prefixes without an override.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Override the TTL for one key prefix. `None` means never stale
    /// (suits immutable lookup lists such as provinces).
    pub fn with_ttl(mut self, prefix: impl Into<String>, ttl: Option<Duration>) -> Self {
        self.ttl_overrides.insert(prefix.into(), ttl);
        self
    }

    /// Set the retention window applied to prefixes without an override.
    pub fn with_default_retention(mut self, retention: Duration) -> Self {
        self.default_retention = retention;
        self
    }

    /// Override the retention window for one key prefix.
    pub fn with_retention(mut self, prefix: impl Into<String>, retention: Duration) -> Self {
        self.retention_overrides.insert(prefix.into(), retention);
        self
    }

    /// TTL for a key prefix; `None` means entries never go stale on their own.
    pub fn ttl_for(&self, prefix: &str) -> Option<Duration> {
        match self.ttl_overrides.get(prefix) {
            Some(ttl) => *ttl,
            None => self.default_ttl,
        }
    }

    /// Retention window for a key prefix. Zero (the default) evicts an entry
    /// as soon as its last subscription is dropped.
    pub fn retention_for(&self, prefix: &str) -> Duration {
        self.retention_overrides
            .get(prefix)
            .copied()
            .unwrap_or(self.default_retention)
    }
}
