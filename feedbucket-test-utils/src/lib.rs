//! feedbucket Test Utilities
//!
//! Centralized test infrastructure for the feedbucket workspace:
//! - Proptest generators for posts, pages and filter selections
//! - Test fixtures for common scenarios
//! - Custom assertions for merge invariants

pub use feedbucket_core::{
    build_key, FeedCacheConfig, FeedItem, FilterKey, ManualClock, PageData, PageMeta, Post,
};

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use std::collections::HashSet;
use uuid::Uuid;

// ============================================================================
// FIXTURES
// ============================================================================

/// 2024-01-01 00:00:00 UTC - fixed reference instant for tests.
pub fn test_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_704_067_200, 0).unwrap_or_default()
}

/// A manual clock starting at [`test_epoch`].
pub fn test_clock() -> ManualClock {
    ManualClock::new(test_epoch())
}

/// Post created `minutes` after [`test_epoch`].
pub fn make_post(id: &str, minutes: i64, owner_id: &str) -> Post {
    Post::new(id, test_epoch() + chrono::Duration::minutes(minutes), owner_id)
}

/// Post with a random id.
pub fn make_random_post(minutes: i64, owner_id: &str) -> Post {
    make_post(&Uuid::now_v7().to_string(), minutes, owner_id)
}

pub fn make_page(items: Vec<Post>, has_next: bool) -> PageData<Post> {
    PageData::new(items, has_next)
}

/// `count` posts owned by `owner_id`, ids `"{prefix}-{n}"`, newest first.
pub fn make_posts(prefix: &str, count: usize, owner_id: &str) -> Vec<Post> {
    (0..count)
        .map(|n| make_post(&format!("{prefix}-{n}"), (count - n) as i64, owner_id))
        .collect()
}

// ============================================================================
// GENERATORS
// ============================================================================

/// Owner ids drawn from a small pool so exclusion tests hit real items.
pub fn arb_owner_id() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["u1", "u2", "u3", "u4"]).prop_map(str::to_string)
}

/// Post ids drawn from a small pool so duplicates across pages are common.
pub fn arb_post_id() -> impl Strategy<Value = String> {
    (0u8..24).prop_map(|n| format!("p{n}"))
}

pub fn arb_post() -> impl Strategy<Value = Post> {
    (arb_post_id(), 0i64..10_000, arb_owner_id()).prop_map(|(id, minutes, owner)| {
        make_post(&id, minutes, &owner)
    })
}

/// A page of up to `max_items` posts. Ids are unique within the page.
pub fn arb_page(max_items: usize) -> impl Strategy<Value = PageData<Post>> {
    (prop::collection::vec(arb_post(), 0..=max_items), any::<bool>()).prop_map(
        |(mut items, has_next)| {
            let mut seen = HashSet::new();
            items.retain(|p| seen.insert(p.id.clone()));
            make_page(items, has_next)
        },
    )
}

/// Up to `max_pages` pages, keyed 1..=n.
pub fn arb_pages(max_pages: usize, max_items: usize) -> impl Strategy<Value = Vec<PageData<Post>>> {
    prop::collection::vec(arb_page(max_items), 1..=max_pages)
}

pub fn arb_filter_ids() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,6}", 0..5)
}

// ============================================================================
// ASSERTIONS
// ============================================================================

/// Assert items are ordered newest first.
pub fn assert_sorted_desc<T: FeedItem>(items: &[T]) {
    for pair in items.windows(2) {
        assert!(
            pair[0].created_at() >= pair[1].created_at(),
            "items out of order: {} ({}) before {} ({})",
            pair[0].item_id(),
            pair[0].created_at(),
            pair[1].item_id(),
            pair[1].created_at()
        );
    }
}

/// Assert no id appears twice.
pub fn assert_unique_ids<T: FeedItem>(items: &[T]) {
    let mut seen = HashSet::new();
    for item in items {
        assert!(seen.insert(item.item_id()), "duplicate id {}", item.item_id());
    }
}

/// Assert no item is owned by any of `blocked`.
pub fn assert_none_owned_by<T: FeedItem>(items: &[T], blocked: &[&str]) {
    for item in items {
        assert!(
            !blocked.contains(&item.owner_id()),
            "item {} owned by blocked {}",
            item.item_id(),
            item.owner_id()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_posts_are_newest_first() {
        let posts = make_posts("a", 5, "u1");
        assert_eq!(posts.len(), 5);
        assert_sorted_desc(&posts);
        assert_unique_ids(&posts);
    }

    #[test]
    fn test_random_posts_have_distinct_ids() {
        let a = make_random_post(1, "u1");
        let b = make_random_post(1, "u1");
        assert_ne!(a.id, b.id);
    }

    proptest! {
        #[test]
        fn prop_arb_page_ids_unique(page in arb_page(12)) {
            let mut seen = HashSet::new();
            for item in &page.items {
                prop_assert!(seen.insert(item.id.clone()));
            }
        }
    }
}
