//! The feed bucket cache engine.
//!
//! [`FeedCache`] owns the bucket map, the exclusion set and the listener
//! registry for one session. Every public operation is synchronous: it takes
//! the state lock, applies its change, records the keys it touched and
//! releases the lock. Each touched key is then emitted on its own: the lock
//! is retaken, a fresh snapshot and a copy of that key's listeners are taken,
//! and the listeners run after the lock is released again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use feedbucket_core::{
    Clock, FeedCacheConfig, FeedItem, FeedResult, FilterKey, PageData, PageNumber, Post,
    SystemClock,
};
use lru::LruCache;
use serde::Serialize;

use crate::bucket::{Bucket, BucketDebugInfo, BucketSnapshot};
use crate::exclusion::ExclusionSet;
use crate::freshness::{evaluate, Freshness};
use crate::lifecycle::{LifecycleListener, LifecycleSource};
use crate::notify::{Delivery, Listener, NotificationHub, SubscriptionId};

/// Page number a first page is stored under.
pub const FIRST_PAGE: PageNumber = 1;

/// Usage counters for a cache instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Buckets currently held.
    pub bucket_count: usize,
    /// Listeners currently registered across all keys.
    pub listener_count: usize,
    /// Buckets dropped to stay within `max_buckets`.
    pub evictions: u64,
    /// Listener invocations, including initial replays on subscribe.
    pub emissions: u64,
    /// Listener invocations that panicked.
    pub listener_failures: u64,
    /// Current exclusion-set revision.
    pub blocked_version: u64,
}

struct CacheState<T> {
    /// Ordered by last load: page writes promote, everything else peeks.
    buckets: LruCache<FilterKey, Bucket<T>>,
    hub: NotificationHub<T>,
    exclusion: ExclusionSet,
    evictions: u64,
}

impl<T: FeedItem> CacheState<T> {
    fn delivery_for(&self, key: &FilterKey) -> Option<Delivery<T>> {
        if !self.hub.has_listeners(key) {
            return None;
        }
        Some(Delivery {
            key: key.clone(),
            listeners: self.hub.listeners_for(key),
            snapshot: self.buckets.peek(key).map(|b| b.snapshot(key)),
        })
    }

    fn all_keys(&self) -> Vec<FilterKey> {
        self.buckets.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Drop least recently loaded buckets (and their listeners) until the
    /// bucket count is within `max`.
    fn evict_over(&mut self, max: usize) {
        while self.buckets.len() > max {
            let Some((key, _)) = self.buckets.pop_lru() else {
                break;
            };
            let dropped = self.hub.take_key(&key).len();
            self.evictions += 1;
            tracing::debug!(
                key = %key,
                dropped_listeners = dropped,
                "Evicted least recently loaded bucket"
            );
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    emissions: AtomicU64,
    listener_failures: AtomicU64,
}

/// In-memory cache of paged, filtered feeds.
///
/// Cloning is cheap and every clone operates on the same state, so a handle
/// can be captured by listeners or handed to a lifecycle source.
///
/// # Example
///
/// ```ignore
/// let cache = FeedCache::<Post>::new(FeedCacheConfig::default())?;
/// let key = FilterKey::build(["teamB", "teamA"]);
///
/// if cache.needs_refresh(&key) {
///     let page = fetch_page(&key, 1).await?;
///     cache.set_first_page(&key, page);
/// }
///
/// let sub = cache.subscribe(&key, |snapshot| render(snapshot));
/// // ...
/// sub.unsubscribe();
/// ```
pub struct FeedCache<T: FeedItem = Post> {
    state: Arc<Mutex<CacheState<T>>>,
    config: Arc<FeedCacheConfig>,
    clock: Arc<dyn Clock>,
    counters: Arc<Counters>,
}

impl<T: FeedItem> Clone for FeedCache<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            config: Arc::clone(&self.config),
            clock: Arc::clone(&self.clock),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<T: FeedItem> std::fmt::Debug for FeedCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedCache")
            .field("config", &self.config)
            .field("buckets", &self.len())
            .finish()
    }
}

impl<T: FeedItem> FeedCache<T> {
    /// Create a cache after validating `config`.
    pub fn new(config: FeedCacheConfig) -> FeedResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache with the default configuration.
    pub fn with_defaults() -> Self {
        Self::from_parts(FeedCacheConfig::default(), Arc::new(SystemClock))
    }

    /// Create a cache reading time from `clock`.
    pub fn with_clock(config: FeedCacheConfig, clock: Arc<dyn Clock>) -> FeedResult<Self> {
        config.validate()?;
        Ok(Self::from_parts(config, clock))
    }

    fn from_parts(config: FeedCacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                buckets: LruCache::unbounded(),
                hub: NotificationHub::default(),
                exclusion: ExclusionSet::new(),
                evictions: 0,
            })),
            config: Arc::new(config),
            clock,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn config(&self) -> &FeedCacheConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Replace the bucket for `key` with one holding only `page` as page 1.
    pub fn set_first_page(&self, key: &FilterKey, page: PageData<T>) {
        {
            let mut state = self.lock();
            self.create_bucket(&mut state, key, FIRST_PAGE, page);
        }
        self.emit(key);
    }

    /// Store `page` at `page_number`, growing the bucket.
    ///
    /// Creates the bucket if it does not exist yet.
    pub fn append_page(&self, key: &FilterKey, page_number: PageNumber, page: PageData<T>) {
        self.write_page(key, page_number, page);
    }

    /// Store `page` at `page_number`, overwriting a previously loaded copy.
    ///
    /// Storage behaviour is identical to [`FeedCache::append_page`].
    pub fn replace_page(&self, key: &FilterKey, page_number: PageNumber, page: PageData<T>) {
        self.write_page(key, page_number, page);
    }

    fn write_page(&self, key: &FilterKey, page_number: PageNumber, page: PageData<T>) {
        let now = self.clock.now();
        {
            let mut state = self.lock();
            let state = &mut *state;
            match state.buckets.get_mut(key) {
                Some(bucket) => {
                    bucket.write_page(page_number, page, now, &state.exclusion);
                    tracing::debug!(key = %key, page = page_number, "Stored page");
                }
                None => self.create_bucket(state, key, page_number, page),
            }
        }
        self.emit(key);
    }

    fn create_bucket(
        &self,
        state: &mut CacheState<T>,
        key: &FilterKey,
        page_number: PageNumber,
        page: PageData<T>,
    ) {
        let bucket = Bucket::with_page(page_number, page, self.clock.now(), &state.exclusion);
        state.buckets.put(key.clone(), bucket);
        tracing::debug!(key = %key, page = page_number, "Created bucket");
        state.evict_over(self.config.max_buckets);
    }

    /// Replace every cached copy of `updated` (matched by id) across all
    /// buckets and notify the buckets that held it.
    pub fn update_item_across_buckets(&self, updated: &T) {
        self.patch_everywhere(|bucket, exclusion| bucket.replace_item(updated, exclusion));
    }

    /// Apply `patch` to every cached copy of `item_id` across all buckets.
    pub fn update_item_with<F>(&self, item_id: &str, mut patch: F)
    where
        F: FnMut(&mut T),
    {
        self.patch_everywhere(|bucket, exclusion| bucket.patch_item(item_id, &mut patch, exclusion));
    }

    /// Delete `item_id` from every page of every bucket.
    pub fn remove_item_everywhere(&self, item_id: &str) {
        self.patch_everywhere(|bucket, exclusion| bucket.remove_item(item_id, exclusion));
    }

    fn patch_everywhere<F>(&self, mut apply: F)
    where
        F: FnMut(&mut Bucket<T>, &ExclusionSet) -> bool,
    {
        let touched = {
            let mut state = self.lock();
            let state = &mut *state;
            let mut touched = Vec::new();
            // iter_mut leaves load order untouched.
            for (key, bucket) in state.buckets.iter_mut() {
                if apply(bucket, &state.exclusion) {
                    touched.push(key.clone());
                }
            }
            touched
        };
        self.emit_all(&touched);
    }

    /// Replace the global exclusion set, re-filter every bucket in place and
    /// notify all of them.
    ///
    /// Buckets keep the revision they were loaded under, so each one also
    /// reports [`StaleReason::ExclusionChanged`](crate::StaleReason) until
    /// refetched.
    pub fn set_blocked_users<I, S>(&self, owner_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys = {
            let mut state = self.lock();
            let state = &mut *state;
            let version = state.exclusion.replace(owner_ids);
            for (_, bucket) in state.buckets.iter_mut() {
                bucket.remerge(&state.exclusion);
            }
            tracing::info!(
                version,
                blocked = state.exclusion.len(),
                buckets = state.buckets.len(),
                "Replaced blocked users"
            );
            state.all_keys()
        };
        self.emit_all(&keys);
    }

    // ------------------------------------------------------------------
    // Staleness
    // ------------------------------------------------------------------

    /// Flag one bucket for refetch while keeping its data readable.
    pub fn mark_stale(&self, key: &FilterKey) {
        {
            let mut state = self.lock();
            match state.buckets.peek_mut(key) {
                Some(bucket) => bucket.mark_stale(),
                None => return,
            }
        }
        self.emit(key);
    }

    /// Flag every bucket for refetch while keeping their data readable.
    pub fn mark_all_stale(&self) {
        let keys = {
            let mut state = self.lock();
            for (_, bucket) in state.buckets.iter_mut() {
                bucket.mark_stale();
            }
            state.all_keys()
        };
        self.emit_all(&keys);
    }

    /// Freshness verdict for `key`.
    pub fn freshness(&self, key: &FilterKey) -> Freshness {
        let now = self.clock.now();
        let state = self.lock();
        evaluate(
            state.buckets.peek(key).map(Bucket::freshness_inputs),
            now,
            self.config.ttl,
            state.exclusion.version(),
        )
    }

    /// Whether the caller should fetch `key` before relying on it.
    pub fn needs_refresh(&self, key: &FilterKey) -> bool {
        self.freshness(key).is_stale()
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Delete a bucket and its listeners. The listeners receive `None` once.
    pub fn remove_bucket(&self, key: &FilterKey) {
        let delivery = {
            let mut state = self.lock();
            let existed = state.buckets.pop(key).is_some();
            let listeners = state.hub.take_key(key);
            tracing::debug!(key = %key, existed, listeners = listeners.len(), "Removed bucket");
            Delivery {
                key: key.clone(),
                listeners,
                snapshot: None,
            }
        };
        self.dispatch(delivery);
    }

    /// Drop every bucket and every listener without notifying them.
    pub fn clear_all(&self) {
        let mut state = self.lock();
        let buckets = state.buckets.len();
        let listeners = state.hub.listener_count();
        state.buckets.clear();
        state.hub.clear();
        tracing::info!(buckets, listeners, "Cleared feed cache");
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn get_bucket_snapshot(&self, key: &FilterKey) -> Option<BucketSnapshot<T>> {
        self.lock().buckets.peek(key).map(|b| b.snapshot(key))
    }

    /// Merged items for `key`, or an empty list when nothing is cached.
    pub fn get_merged_posts(&self, key: &FilterKey) -> Vec<T> {
        self.lock()
            .buckets
            .peek(key)
            .map(|b| b.merged().to_vec())
            .unwrap_or_default()
    }

    pub fn contains(&self, key: &FilterKey) -> bool {
        self.lock().buckets.contains(key)
    }

    /// Cached keys, most recently loaded first.
    pub fn bucket_keys(&self) -> Vec<FilterKey> {
        self.lock().all_keys()
    }

    pub fn len(&self) -> usize {
        self.lock().buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn blocked_users(&self) -> Vec<String> {
        self.lock().exclusion.owners()
    }

    pub fn blocked_version(&self) -> u64 {
        self.lock().exclusion.version()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            bucket_count: state.buckets.len(),
            listener_count: state.hub.listener_count(),
            evictions: state.evictions,
            emissions: self.counters.emissions.load(Ordering::Relaxed),
            listener_failures: self.counters.listener_failures.load(Ordering::Relaxed),
            blocked_version: state.exclusion.version(),
        }
    }

    /// Diagnostic dump of every bucket, most recently loaded first.
    pub fn debug_snapshot(&self) -> Vec<BucketDebugInfo> {
        let now = self.clock.now();
        let state = self.lock();
        let infos: Vec<BucketDebugInfo> = state
            .buckets
            .iter()
            .map(|(key, bucket)| bucket.debug_info(key, now))
            .collect();
        tracing::debug!(buckets = infos.len(), "Feed cache debug snapshot");
        infos
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// Register `listener` for `key` and call it once, before returning,
    /// with the current snapshot (or `None`).
    pub fn subscribe<F>(&self, key: &FilterKey, listener: F) -> Subscription<T>
    where
        F: Fn(Option<&BucketSnapshot<T>>) + Send + Sync + 'static,
    {
        let listener: Listener<T> = Arc::new(listener);
        let (id, replay) = {
            let mut state = self.lock();
            let id = state.hub.add(key, Arc::clone(&listener));
            let replay = Delivery {
                key: key.clone(),
                listeners: vec![listener],
                snapshot: state.buckets.peek(key).map(|b| b.snapshot(key)),
            };
            (id, replay)
        };
        self.dispatch(replay);

        Subscription {
            state: Arc::downgrade(&self.state),
            key: key.clone(),
            id,
        }
    }

    /// Register this cache with a host lifecycle source.
    pub fn attach_lifecycle(&self, source: &dyn LifecycleSource) {
        source.attach(Arc::new(self.clone()));
    }

    /// Notify the current listeners of `key` with its current snapshot.
    fn emit(&self, key: &FilterKey) {
        let delivery = self.lock().delivery_for(key);
        if let Some(delivery) = delivery {
            self.dispatch(delivery);
        }
    }

    /// Emit each key in turn. Every key is read afresh, so changes made by
    /// earlier listeners are visible to later ones.
    fn emit_all(&self, keys: &[FilterKey]) {
        for key in keys {
            self.emit(key);
        }
    }

    fn dispatch(&self, delivery: Delivery<T>) {
        let calls = delivery.listeners.len() as u64;
        if calls == 0 {
            return;
        }
        tracing::debug!(key = %delivery.key, listeners = calls, "Emitting snapshot");
        let failures = delivery.dispatch();
        self.counters.emissions.fetch_add(calls, Ordering::Relaxed);
        if failures > 0 {
            self.counters
                .listener_failures
                .fetch_add(failures, Ordering::Relaxed);
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: FeedItem> LifecycleListener for FeedCache<T> {
    fn on_foreground_after_background(&self, elapsed: Duration) {
        if elapsed < self.config.ttl {
            return;
        }
        tracing::info!(
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "Foregrounded after TTL, marking all buckets stale"
        );
        self.mark_all_stale();
    }
}

/// Handle returned by [`FeedCache::subscribe`].
///
/// Dropping the handle does not unsubscribe; call
/// [`Subscription::unsubscribe`].
#[must_use = "the listener stays registered until `unsubscribe` is called"]
pub struct Subscription<T> {
    state: Weak<Mutex<CacheState<T>>>,
    key: FilterKey,
    id: SubscriptionId,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn key(&self) -> &FilterKey {
        &self.key
    }

    /// Remove the listener. Returns `false` if it was already gone (bucket
    /// removed, evicted, cache cleared or dropped).
    pub fn unsubscribe(self) -> bool {
        let Some(state) = self.state.upgrade() else {
            return false;
        };
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
        state.hub.remove(&self.key, self.id)
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}
