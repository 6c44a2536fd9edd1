//! Property-Based Tests for the Feed Cache
//!
//! **Property 1: Merge correctness**
//!
//! For any set of pages, the merged list SHALL contain each surviving id
//! exactly once, SHALL be ordered newest first and SHALL hold the copy from
//! the highest page that carries the id.
//!
//! **Property 2: Exclusion**
//!
//! For any blocked-owner set, no merged list SHALL contain an item owned by
//! a blocked owner, and clearing the set SHALL restore every item.
//!
//! **Property 3: Capacity**
//!
//! After any sequence of first-page writes the cache SHALL hold at most
//! `max_buckets` buckets, keeping the most recently loaded ones.
//!
//! **Property 4: Key canonicalisation**
//!
//! Filter keys SHALL NOT depend on the order of the selected ids.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use feedbucket_cache::{FeedCache, FeedCacheConfig, FilterKey, Post};
use feedbucket_test_utils::*;
use proptest::prelude::*;

fn cache(max_buckets: usize) -> FeedCache<Post> {
    let config = FeedCacheConfig::new()
        .with_ttl(Duration::from_secs(300))
        .with_max_buckets(max_buckets);
    FeedCache::with_clock(config, Arc::new(test_clock())).unwrap()
}

fn load(cache: &FeedCache<Post>, key: &FilterKey, pages: Vec<PageData<Post>>) {
    for (index, page) in pages.into_iter().enumerate() {
        let page_number = index as u32 + 1;
        if page_number == 1 {
            cache.set_first_page(key, page);
        } else {
            cache.append_page(key, page_number, page);
        }
    }
}

/// Expected winner per id: the copy from the highest page holding it.
fn expected_winners(pages: &[PageData<Post>]) -> HashMap<String, Post> {
    let mut winners = HashMap::new();
    for page in pages {
        for post in &page.items {
            winners.insert(post.id.clone(), post.clone());
        }
    }
    winners
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_merge_is_sorted_and_deduplicated(pages in arb_pages(5, 8)) {
        let cache = cache(20);
        let key = FilterKey::all();
        let winners = expected_winners(&pages);

        load(&cache, &key, pages);
        let merged = cache.get_merged_posts(&key);

        assert_sorted_desc(&merged);
        assert_unique_ids(&merged);
        prop_assert_eq!(merged.len(), winners.len());
        for post in &merged {
            prop_assert_eq!(Some(post), winners.get(&post.id));
        }
    }

    #[test]
    fn prop_blocked_owners_never_visible(
        pages in arb_pages(4, 8),
        blocked in prop::collection::hash_set(arb_owner_id(), 0..3),
    ) {
        let cache = cache(20);
        let key = FilterKey::all();
        let total = expected_winners(&pages).len();
        load(&cache, &key, pages);

        cache.set_blocked_users(blocked.iter().cloned());
        let blocked_refs: Vec<&str> = blocked.iter().map(String::as_str).collect();
        let merged = cache.get_merged_posts(&key);
        assert_none_owned_by(&merged, &blocked_refs);
        if !blocked.is_empty() {
            prop_assert!(cache.needs_refresh(&key));
        }

        cache.set_blocked_users(Vec::<String>::new());
        prop_assert_eq!(cache.get_merged_posts(&key).len(), total);
    }

    #[test]
    fn prop_exclusion_applies_to_new_pages(
        blocked in arb_owner_id(),
        pages in arb_pages(3, 8),
    ) {
        let cache = cache(20);
        let key = FilterKey::from("late");
        cache.set_blocked_users([blocked.clone()]);

        load(&cache, &key, pages);

        assert_none_owned_by(&cache.get_merged_posts(&key), &[blocked.as_str()]);
        prop_assert!(!cache.needs_refresh(&key));
    }

    #[test]
    fn prop_capacity_keeps_most_recent(
        max_buckets in 1usize..6,
        keys in prop::collection::vec("[a-h]", 1..20),
    ) {
        let cache = cache(max_buckets);
        let mut recency: Vec<String> = Vec::new();
        let mut evicted = 0u64;

        for key in &keys {
            cache.set_first_page(&FilterKey::from(key.as_str()), make_page(vec![], false));
            recency.retain(|k| k != key);
            recency.insert(0, key.clone());
            if recency.len() > max_buckets {
                recency.truncate(max_buckets);
                evicted += 1;
            }
        }

        let expected: Vec<FilterKey> = recency
            .iter()
            .map(|k| FilterKey::from(k.as_str()))
            .collect();
        prop_assert!(cache.len() <= max_buckets);
        prop_assert_eq!(cache.bucket_keys(), expected);
        prop_assert_eq!(cache.stats().evictions, evicted);
    }

    #[test]
    fn prop_key_ignores_selection_order(ids in arb_filter_ids()) {
        let mut reversed = ids.clone();
        reversed.reverse();

        let key = FilterKey::build(&ids);
        prop_assert_eq!(&key, &FilterKey::build(&reversed));

        let distinct: HashSet<&String> = ids.iter().collect();
        if distinct.is_empty() {
            prop_assert!(key.is_all());
        } else {
            prop_assert_eq!(key.as_str().split(',').count(), distinct.len());
        }
    }

    #[test]
    fn prop_remove_item_everywhere(pages in arb_pages(3, 8), victim in arb_post_id()) {
        let cache = cache(20);
        let (a, b) = (FilterKey::from("a"), FilterKey::from("b"));
        load(&cache, &a, pages.clone());
        load(&cache, &b, pages);

        cache.remove_item_everywhere(&victim);

        for key in [&a, &b] {
            prop_assert!(cache.get_merged_posts(key).iter().all(|p| p.id != victim));
        }
    }
}
