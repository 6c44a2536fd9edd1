//! feedbucket Core - Data Types
//!
//! Pure data structures shared by the cache engine and its callers: filter
//! keys, the feed item contract, page payloads, configuration, clocks and
//! errors. This crate contains no caching logic.

mod clock;
mod config;
mod error;
mod item;
mod key;
mod page;

pub use clock::{elapsed_between, Clock, ManualClock, SystemClock};
pub use config::{FeedCacheConfig, DEFAULT_MAX_BUCKETS, DEFAULT_TTL};
pub use error::{ConfigError, FeedError, FeedResult, PageError};
pub use item::{FeedItem, Post};
pub use key::{build_key, FilterKey, ALL_KEY, KEY_DELIMITER};
pub use page::{PageData, PageMeta};

/// Page numbers as used by the listing endpoints (1-based by convention).
pub type PageNumber = u32;
