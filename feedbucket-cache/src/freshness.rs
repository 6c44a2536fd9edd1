//! Per-bucket freshness state.
//!
//! A bucket is fresh only while all of these hold: it exists, nobody marked
//! it stale, its last load is younger than the TTL, and it was loaded under
//! the current exclusion-set revision. Staleness never discards data; reads
//! keep returning the last good merge until the caller refetches.

use std::time::Duration;

use chrono::{DateTime, Utc};
use feedbucket_core::elapsed_between;
use serde::Serialize;

/// Why a bucket needs a refetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleReason {
    /// No bucket exists for the key.
    Missing,
    /// Explicitly marked via `mark_stale`, `mark_all_stale` or a long
    /// background period.
    Marked,
    /// The exclusion set changed since the bucket was loaded.
    ExclusionChanged,
    /// The TTL elapsed since the last load.
    Expired,
}

/// Freshness verdict for one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum Freshness {
    Fresh,
    Stale(StaleReason),
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh)
    }

    pub fn is_stale(&self) -> bool {
        !self.is_fresh()
    }

    pub fn reason(&self) -> Option<StaleReason> {
        match self {
            Self::Fresh => None,
            Self::Stale(reason) => Some(*reason),
        }
    }
}

/// The freshness-relevant state of an existing bucket.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FreshnessInputs {
    pub stale: bool,
    pub last_loaded_at: DateTime<Utc>,
    pub blocked_version: u64,
}

/// Evaluate a bucket against the TTL and the current exclusion revision.
///
/// Reasons are checked in a fixed order: missing, marked, exclusion change,
/// expiry. A bucket exactly `ttl` old counts as expired.
pub(crate) fn evaluate(
    bucket: Option<FreshnessInputs>,
    now: DateTime<Utc>,
    ttl: Duration,
    current_blocked_version: u64,
) -> Freshness {
    let Some(bucket) = bucket else {
        return Freshness::Stale(StaleReason::Missing);
    };

    if bucket.stale {
        return Freshness::Stale(StaleReason::Marked);
    }
    if bucket.blocked_version != current_blocked_version {
        return Freshness::Stale(StaleReason::ExclusionChanged);
    }
    if elapsed_between(bucket.last_loaded_at, now) >= ttl {
        return Freshness::Stale(StaleReason::Expired);
    }
    Freshness::Fresh
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    fn inputs(loaded: DateTime<Utc>) -> FreshnessInputs {
        FreshnessInputs {
            stale: false,
            last_loaded_at: loaded,
            blocked_version: 0,
        }
    }

    #[test]
    fn test_missing_is_stale() {
        let verdict = evaluate(None, Utc::now(), TTL, 0);
        assert_eq!(verdict, Freshness::Stale(StaleReason::Missing));
        assert!(verdict.is_stale());
    }

    #[test]
    fn test_fresh_within_ttl() {
        let now = Utc::now();
        let verdict = evaluate(Some(inputs(now - chrono::Duration::seconds(59))), now, TTL, 0);
        assert!(verdict.is_fresh());
        assert_eq!(verdict.reason(), None);
    }

    #[test]
    fn test_expired_at_ttl_boundary() {
        let now = Utc::now();
        let verdict = evaluate(Some(inputs(now - chrono::Duration::seconds(60))), now, TTL, 0);
        assert_eq!(verdict.reason(), Some(StaleReason::Expired));
    }

    #[test]
    fn test_marked_takes_precedence() {
        let now = Utc::now();
        let mut bucket = inputs(now - chrono::Duration::hours(1));
        bucket.stale = true;
        bucket.blocked_version = 3;
        assert_eq!(
            evaluate(Some(bucket), now, TTL, 4),
            Freshness::Stale(StaleReason::Marked)
        );
    }

    #[test]
    fn test_exclusion_version_mismatch() {
        let now = Utc::now();
        assert_eq!(
            evaluate(Some(inputs(now)), now, TTL, 1).reason(),
            Some(StaleReason::ExclusionChanged)
        );
    }

    #[test]
    fn test_clock_skew_backwards_is_fresh() {
        let now = Utc::now();
        let verdict = evaluate(Some(inputs(now + chrono::Duration::seconds(30))), now, TTL, 0);
        assert!(verdict.is_fresh());
    }

    #[test]
    fn test_freshness_serializes_with_reason() {
        let json = serde_json::to_value(Freshness::Stale(StaleReason::Expired)).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "stale", "reason": "expired" }));
    }
}
