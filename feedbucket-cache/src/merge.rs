//! Merge engine: folds a bucket's pages into one list.

use std::collections::{BTreeMap, HashMap};

use feedbucket_core::{FeedItem, PageData, PageNumber};

use crate::exclusion::{filter_excluded, ExclusionSet};

/// Merge pages into a deduplicated, newest-first, exclusion-filtered list.
///
/// Pages are visited in ascending page order; when an id appears on more
/// than one page the copy from the highest page number wins. Ties on
/// `created_at` keep first-seen order.
pub fn merge_pages<T: FeedItem>(
    pages: &BTreeMap<PageNumber, PageData<T>>,
    exclusion: &ExclusionSet,
) -> Vec<T> {
    let capacity = pages.values().map(|p| p.items.len()).sum();
    let mut slots: HashMap<&str, usize> = HashMap::with_capacity(capacity);
    let mut merged: Vec<T> = Vec::with_capacity(capacity);

    for page in pages.values() {
        for item in &page.items {
            match slots.get(item.item_id()) {
                Some(&slot) => merged[slot] = item.clone(),
                None => {
                    slots.insert(item.item_id(), merged.len());
                    merged.push(item.clone());
                }
            }
        }
    }

    // Stable sort keeps first-seen order for equal timestamps.
    merged.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    filter_excluded(merged, exclusion)
}
