//! Canonical bucket keys built from filter selections.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

/// Key used when no filter is applied.
pub const ALL_KEY: &str = "all";

/// Delimiter between filter identifiers inside a key.
pub const KEY_DELIMITER: &str = ",";

/// Canonical string identifying one filter combination.
///
/// Equivalent filter sets map to the same key regardless of input order,
/// so two views over the same filters always share a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterKey(String);

impl FilterKey {
    /// Build the canonical key for a set of filter identifiers.
    ///
    /// Identifiers are deduplicated, sorted lexicographically and joined
    /// with [`KEY_DELIMITER`]. An empty selection yields [`ALL_KEY`].
    pub fn build<I, S>(filter_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: BTreeSet<String> = filter_ids
            .into_iter()
            .map(|id| id.as_ref().to_string())
            .collect();

        if ids.is_empty() {
            return Self::all();
        }

        Self(ids.into_iter().collect::<Vec<_>>().join(KEY_DELIMITER))
    }

    /// Build a key from an optional selection; `None` means "no filter".
    pub fn from_optional<I, S>(filter_ids: Option<I>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match filter_ids {
            Some(ids) => Self::build(ids),
            None => Self::all(),
        }
    }

    /// The unfiltered key.
    pub fn all() -> Self {
        Self(ALL_KEY.to_string())
    }

    /// Wrap an already-canonical key string without re-sorting it.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Whether this is the unfiltered key.
    pub fn is_all(&self) -> bool {
        self.0 == ALL_KEY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FilterKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for FilterKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FilterKey {
    fn from(raw: &str) -> Self {
        Self::from_raw(raw)
    }
}

impl From<String> for FilterKey {
    fn from(raw: String) -> Self {
        Self::from_raw(raw)
    }
}

/// Build the canonical key for a filter selection.
///
/// Free-function form of [`FilterKey::from_optional`].
pub fn build_key<I, S>(filter_ids: Option<I>) -> FilterKey
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    FilterKey::from_optional(filter_ids)
}
