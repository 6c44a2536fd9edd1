//! feedbucket Cache - Bucketed Feed Cache Engine
//!
//! Client-side cache for paginated, filterable feeds. Each filter
//! combination gets a bucket holding its loaded pages and a merged,
//! deduplicated, newest-first view of them.
//!
//! # Architecture
//!
//! ```text
//! caller ──write──► FeedCache ──► Bucket (page store) ──► merge ──► exclusion filter
//!                      │                                                   │
//!                      └──────────── NotificationHub ◄──── snapshot ◄──────┘
//!                                         │
//!                                         ▼
//!                                    subscribers
//! ```
//!
//! - Freshness: a bucket needs a refetch once its TTL elapses, once it is
//!   marked stale, or once the global exclusion set changes. Stale buckets
//!   keep serving their last merge.
//! - Capacity: buckets beyond `max_buckets` are evicted least recently
//!   *loaded* first.
//! - Exclusion: replacing the blocked-owner set re-filters every bucket
//!   immediately, without waiting for a refetch.
//! - Lifecycle: a [`LifecycleSource`] reports time spent in the background;
//!   returning after at least one TTL marks every bucket stale.

mod bucket;
mod engine;
mod exclusion;
mod freshness;
mod lifecycle;
mod merge;
mod notify;

pub use bucket::{BucketDebugInfo, BucketSnapshot};
pub use engine::{CacheStats, FeedCache, Subscription, FIRST_PAGE};
pub use exclusion::{filter_excluded, ExclusionSet};
pub use freshness::{Freshness, StaleReason};
pub use lifecycle::{
    AppState, AppStateTracker, LifecycleListener, LifecycleSource, NoopLifecycleSource,
};
pub use merge::merge_pages;
pub use notify::{Listener, SubscriptionId};

// Re-export core types for convenience
pub use feedbucket_core::{
    build_key, Clock, FeedCacheConfig, FeedError, FeedItem, FeedResult, FilterKey, ManualClock,
    PageData, PageMeta, PageNumber, Post, SystemClock,
};
