//! Error types for feedbucket operations

use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Errors raised while turning raw page payloads into typed pages.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("Failed to decode page: {reason}")]
    Decode { reason: String },
}

/// Master error type for all feedbucket errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Page error: {0}")]
    Page(#[from] PageError),
}

/// Result type alias for feedbucket operations.
pub type FeedResult<T> = Result<T, FeedError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "max_buckets".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("max_buckets"));
        assert!(msg.contains("0"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_page_error_display_decode() {
        let err = PageError::Decode {
            reason: "missing field `id`".to_string(),
        };
        assert!(format!("{}", err).contains("missing field"));
    }

    #[test]
    fn test_feed_error_from_config() {
        let err: FeedError = ConfigError::InvalidValue {
            field: "ttl".to_string(),
            value: "0ns".to_string(),
            reason: "ttl must be positive".to_string(),
        }
        .into();
        assert!(matches!(err, FeedError::Config(_)));
        assert!(format!("{}", err).starts_with("Config error"));
    }
}
