//! Global exclusion set (blocked owners) and the filter applied to merges.

use feedbucket_core::FeedItem;
use std::collections::HashSet;

/// Set of owner ids whose items must never be shown, plus a revision
/// counter bumped on every replacement.
///
/// Buckets stamp the revision they were loaded under; a mismatch with the
/// current revision marks them as needing a refresh.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    owners: HashSet<String>,
    version: u64,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set and bump the revision. Returns the new revision.
    pub fn replace<I, S>(&mut self, owner_ids: I) -> u64
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.owners = owner_ids.into_iter().map(Into::into).collect();
        self.version += 1;
        self.version
    }

    pub fn is_blocked(&self, owner_id: &str) -> bool {
        self.owners.contains(owner_id)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Blocked owner ids, sorted for stable output.
    pub fn owners(&self) -> Vec<String> {
        let mut owners: Vec<String> = self.owners.iter().cloned().collect();
        owners.sort();
        owners
    }
}

/// Drop every item whose owner is blocked.
pub fn filter_excluded<T: FeedItem>(items: Vec<T>, exclusion: &ExclusionSet) -> Vec<T> {
    if exclusion.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| !exclusion.is_blocked(item.owner_id()))
        .collect()
}
