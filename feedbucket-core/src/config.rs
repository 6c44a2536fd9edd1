//! Configuration types

use crate::{ConfigError, FeedResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time-to-live for a bucket's last load.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default maximum number of buckets kept in memory.
pub const DEFAULT_MAX_BUCKETS: usize = 20;

/// Configuration for a feed cache instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedCacheConfig {
    /// Maximum age of a bucket's last load before it must be refetched.
    pub ttl: Duration,
    /// Upper bound on the number of buckets. The least recently loaded
    /// bucket is evicted first.
    pub max_buckets: usize,
}

impl Default for FeedCacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_buckets: DEFAULT_MAX_BUCKETS,
        }
    }
}

impl FeedCacheConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bucket TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the maximum bucket count.
    pub fn with_max_buckets(mut self, max: usize) -> Self {
        self.max_buckets = max;
        self
    }

    /// Rejects a zero TTL and a zero bucket capacity.
    pub fn validate(&self) -> FeedResult<()> {
        if self.ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "ttl".to_string(),
                value: format!("{:?}", self.ttl),
                reason: "ttl must be positive".to_string(),
            }
            .into());
        }

        if self.max_buckets == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_buckets".to_string(),
                value: self.max_buckets.to_string(),
                reason: "max_buckets must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FeedError;

    #[test]
    fn test_default_config_is_valid() {
        let config = FeedCacheConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ttl, DEFAULT_TTL);
        assert_eq!(config.max_buckets, DEFAULT_MAX_BUCKETS);
    }

    #[test]
    fn test_config_builder() {
        let config = FeedCacheConfig::new()
            .with_ttl(Duration::from_secs(30))
            .with_max_buckets(3);

        assert_eq!(config.ttl, Duration::from_secs(30));
        assert_eq!(config.max_buckets, 3);
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let err = FeedCacheConfig::new()
            .with_ttl(Duration::ZERO)
            .validate()
            .unwrap_err();
        match err {
            FeedError::Config(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "ttl"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = FeedCacheConfig::new()
            .with_max_buckets(0)
            .validate()
            .unwrap_err();
        assert!(format!("{}", err).contains("max_buckets"));
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = FeedCacheConfig::new().with_max_buckets(7);
        let json = serde_json::to_string(&config).unwrap();
        let back: FeedCacheConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
