//! Bucket state: the page store for one filter key and its derived merge.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use feedbucket_core::{elapsed_between, FeedItem, FilterKey, PageData, PageMeta, PageNumber};
use serde::Serialize;

use crate::exclusion::ExclusionSet;
use crate::freshness::FreshnessInputs;
use crate::merge::merge_pages;

/// All loaded pages for one filter key plus the merged view derived from them.
///
/// `merged` is never edited directly; every mutation goes through the page
/// map and ends with [`Bucket::remerge`].
#[derive(Debug, Clone)]
pub(crate) struct Bucket<T> {
    pages: BTreeMap<PageNumber, PageData<T>>,
    merged: Vec<T>,
    meta: PageMeta,
    last_loaded_at: DateTime<Utc>,
    stale: bool,
    blocked_version: u64,
}

impl<T: FeedItem> Bucket<T> {
    /// A bucket holding a single page.
    pub fn with_page(
        page_number: PageNumber,
        page: PageData<T>,
        loaded_at: DateTime<Utc>,
        exclusion: &ExclusionSet,
    ) -> Self {
        let mut bucket = Self {
            pages: BTreeMap::new(),
            merged: Vec::new(),
            meta: PageMeta::default(),
            last_loaded_at: loaded_at,
            stale: false,
            blocked_version: exclusion.version(),
        };
        bucket.write_page(page_number, page, loaded_at, exclusion);
        bucket
    }

    /// Insert or overwrite one page and mark the bucket as freshly loaded.
    pub fn write_page(
        &mut self,
        page_number: PageNumber,
        page: PageData<T>,
        loaded_at: DateTime<Utc>,
        exclusion: &ExclusionSet,
    ) {
        self.pages.insert(page_number, page);
        self.last_loaded_at = loaded_at;
        self.stale = false;
        self.blocked_version = exclusion.version();
        self.remerge(exclusion);
    }

    /// Recompute the merged list and the metadata of the highest page.
    pub fn remerge(&mut self, exclusion: &ExclusionSet) {
        self.merged = merge_pages(&self.pages, exclusion);
        self.meta = self
            .pages
            .values()
            .next_back()
            .map(PageData::meta)
            .unwrap_or_default();
    }

    /// Replace every stored copy of `item`. Returns whether anything changed.
    pub fn replace_item(&mut self, item: &T, exclusion: &ExclusionSet) -> bool {
        self.patch_item(item.item_id(), |slot| *slot = item.clone(), exclusion)
    }

    /// Apply `patch` to every stored copy of `item_id`. Returns whether any
    /// copy was found.
    pub fn patch_item<F>(&mut self, item_id: &str, mut patch: F, exclusion: &ExclusionSet) -> bool
    where
        F: FnMut(&mut T),
    {
        let mut touched = false;
        for page in self.pages.values_mut() {
            for slot in page.items.iter_mut().filter(|i| i.item_id() == item_id) {
                patch(slot);
                touched = true;
            }
        }
        if touched {
            self.remerge(exclusion);
        }
        touched
    }

    /// Drop `item_id` from every page. Returns whether anything was removed.
    pub fn remove_item(&mut self, item_id: &str, exclusion: &ExclusionSet) -> bool {
        let mut removed = false;
        for page in self.pages.values_mut() {
            let before = page.items.len();
            page.items.retain(|i| i.item_id() != item_id);
            removed |= page.items.len() != before;
        }
        if removed {
            self.remerge(exclusion);
        }
        removed
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn merged(&self) -> &[T] {
        &self.merged
    }

    pub fn freshness_inputs(&self) -> FreshnessInputs {
        FreshnessInputs {
            stale: self.stale,
            last_loaded_at: self.last_loaded_at,
            blocked_version: self.blocked_version,
        }
    }

    pub fn snapshot(&self, key: &FilterKey) -> BucketSnapshot<T> {
        BucketSnapshot {
            key: key.clone(),
            items: self.merged.clone(),
            has_next: self.meta.has_next,
            stale: self.stale,
            last_loaded_at: self.last_loaded_at,
            page_count: self.pages.len(),
            meta: self.meta,
        }
    }

    pub fn debug_info(&self, key: &FilterKey, now: DateTime<Utc>) -> BucketDebugInfo {
        BucketDebugInfo {
            key: key.clone(),
            pages: self.pages.keys().copied().collect(),
            merged_len: self.merged.len(),
            has_next: self.meta.has_next,
            stale: self.stale,
            age: elapsed_between(self.last_loaded_at, now),
            blocked_version: self.blocked_version,
        }
    }
}

/// Read-only projection of a bucket delivered to readers and subscribers.
///
/// Owns copies of the merged items, so holding or mutating a snapshot never
/// reaches back into the cache. The raw page map is never exposed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketSnapshot<T> {
    pub key: FilterKey,
    pub items: Vec<T>,
    pub has_next: bool,
    pub stale: bool,
    pub last_loaded_at: DateTime<Utc>,
    pub page_count: usize,
    pub meta: PageMeta,
}

/// Diagnostic view of one bucket, as returned by `debug_snapshot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketDebugInfo {
    pub key: FilterKey,
    pub pages: Vec<PageNumber>,
    pub merged_len: usize,
    pub has_next: bool,
    pub stale: bool,
    pub age: Duration,
    pub blocked_version: u64,
}
