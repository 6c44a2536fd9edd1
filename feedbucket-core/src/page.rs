//! Page payloads and pagination metadata.

use crate::{FeedResult, PageError};
use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::{Deserialize, Serialize};

/// One page of items plus the pagination metadata returned with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct PageData<T> {
    #[serde(default = "Vec::new", deserialize_with = "lenient_items")]
    pub items: Vec<T>,
    #[serde(default)]
    pub has_next: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
    /// Page size requested from the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Page number as reported by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl<T> PageData<T> {
    pub fn new(items: Vec<T>, has_next: bool) -> Self {
        Self {
            items,
            has_next,
            total: None,
            total_pages: None,
            limit: None,
            page: None,
        }
    }

    pub fn with_total(mut self, total: u64, total_pages: u32) -> Self {
        self.total = Some(total);
        self.total_pages = Some(total_pages);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Pagination metadata of this page.
    pub fn meta(&self) -> PageMeta {
        PageMeta {
            has_next: self.has_next,
            total: self.total,
            total_pages: self.total_pages,
            limit: self.limit,
            page: self.page,
        }
    }
}

impl<T: DeserializeOwned> PageData<T> {
    /// Decode a raw JSON page.
    ///
    /// A non-array `items` field is coerced to an empty page rather than
    /// rejected. Items that are present but malformed are a decode error.
    pub fn from_json(value: serde_json::Value) -> FeedResult<Self> {
        serde_json::from_value(value).map_err(|e| {
            PageError::Decode {
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// Pagination metadata carried by a bucket.
///
/// A bucket reports the metadata of its highest-numbered loaded page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub has_next: bool,
    pub total: Option<u64>,
    pub total_pages: Option<u32>,
    pub limit: Option<u32>,
    pub page: Option<u32>,
}

fn lenient_items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Array(values) => values
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(D::Error::custom))
            .collect(),
        other => {
            tracing::warn!(
                found = json_kind(&other),
                "Page items is not an array, treating page as empty"
            );
            Ok(Vec::new())
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
