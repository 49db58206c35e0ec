//! Case-insensitive header access
//!
//! Header names are matched ignoring ASCII case, as HTTP requires. The
//! casing a caller supplies is never rewritten here: canonicalization sorts
//! and renders names exactly as given, and only uses this module to find
//! their values.

use std::collections::BTreeMap;

/// Read-only, case-insensitive view over a request's headers.
///
/// Implemented for the owned [`HeaderSet`] and for `axum::http::HeaderMap`
/// so the HTTP layer can canonicalize a request without copying it.
pub trait HeaderLookup {
    /// Value of the header `name`, matched ignoring ASCII case.
    ///
    /// Multi-valued headers yield their first value. Returns `None` when the
    /// header is absent or its value is not text.
    fn lookup(&self, name: &str) -> Option<&str>;

    /// Value of `name` if it is present and non-empty.
    fn lookup_non_empty(&self, name: &str) -> Option<&str> {
        self.lookup(name).filter(|value| !value.is_empty())
    }
}

/// Owned header collection keyed by lowercased name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    entries: BTreeMap<String, String>,
}

impl HeaderSet {
    /// Create an empty header set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a header. Returns the previous value, if any.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        self.entries
            .insert(name.as_ref().to_ascii_lowercase(), value.into())
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Remove a header, matched ignoring case
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl HeaderLookup for HeaderSet {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for HeaderSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = HeaderSet::new();
        for (name, value) in iter {
            set.insert(name, value);
        }
        set
    }
}

impl HeaderLookup for axum::http::HeaderMap {
    fn lookup(&self, name: &str) -> Option<&str> {
        // `HeaderMap::get` lowercases `&str` keys; names that are not valid
        // header tokens simply miss.
        self.get(name).and_then(|value| value.to_str().ok())
    }
}
