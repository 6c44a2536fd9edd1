//! Feed item contract and the default post type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trait for records that can live in a feed bucket.
///
/// # Implementation Requirements
///
/// - `item_id()` must be unique across every page of every bucket; it is the
///   deduplication key when pages are merged
/// - `created_at()` orders the merged list (newest first)
/// - `owner_id()` is matched against the global exclusion set
pub trait FeedItem: Clone + Send + Sync + 'static {
    fn item_id(&self) -> &str;

    fn created_at(&self) -> DateTime<Utc>;

    fn owner_id(&self) -> &str;
}

/// A feed post as delivered by the listing endpoints.
///
/// Only the fields the cache needs are typed; everything else the UI renders
/// rides along in `body`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub body: serde_json::Value,
}

impl Post {
    /// Create a post with an empty body.
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>, owner_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at,
            owner_id: owner_id.into(),
            body: serde_json::Value::Null,
        }
    }

    /// Attach an arbitrary JSON body.
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = body;
        self
    }
}

impl FeedItem for Post {
    fn item_id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}
