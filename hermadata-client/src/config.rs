//! Configuration loading for the Hermadata client.
//!
//! All fields are required unless explicitly marked optional.

use hermadata_cache::CachePolicy;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    /// Path of the login endpoint, e.g. `/auth/login`.
    pub auth_path: String,
    pub request_timeout_ms: u64,
    pub cache: CacheSettings,
}

/// Cache tuning: staleness and retention, with per-prefix overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    pub default_ttl_ms: u64,
    pub retention_ms: u64,
    /// TTL overrides per key prefix. A value of 0 means never stale.
    #[serde(default)]
    pub ttl_overrides_ms: HashMap<String, u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl_ms: 60_000,
            retention_ms: 0,
            ttl_overrides_ms: HashMap::new(),
        }
    }
}

impl CacheSettings {
    /// Build the coordinator policy these settings describe.
    pub fn to_policy(&self) -> CachePolicy {
        let mut policy = CachePolicy::new()
            .with_default_ttl(Duration::from_millis(self.default_ttl_ms))
            .with_default_retention(Duration::from_millis(self.retention_ms));
        for (prefix, ttl_ms) in &self.ttl_overrides_ms {
            let ttl = if *ttl_ms == 0 {
                None
            } else {
                Some(Duration::from_millis(*ttl_ms))
            };
            policy = policy.with_ttl(prefix.clone(), ttl);
        }
        policy
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.auth_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "auth_path",
                reason: "must be an absolute path".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
