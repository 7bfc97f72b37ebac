use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use scholar_core::DedupKey;

/// Set of `(email, source_url)` keys already emitted.
///
/// Membership test and insertion happen under one lock, so concurrent callers
/// racing on the same key get exactly one winner.
#[derive(Debug, Default)]
pub struct DedupStore {
    keys: Mutex<HashSet<DedupKey>>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn keys(&self) -> MutexGuard<'_, HashSet<DedupKey>> {
        // Every mutation is a single set call, so a poisoned set is still consistent.
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` if the key was new and is now recorded, `false` for a duplicate.
    pub fn try_insert(&self, email: &str, source_url: &str) -> bool {
        self.keys().insert(DedupKey::new(email, source_url))
    }

    /// Forgets a key, e.g. when the record it stood for could not be persisted.
    pub fn remove(&self, email: &str, source_url: &str) -> bool {
        self.keys().remove(&DedupKey::new(email, source_url))
    }

    pub fn contains(&self, email: &str, source_url: &str) -> bool {
        self.keys().contains(&DedupKey::new(email, source_url))
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    /// Distinct emails across all recorded sources.
    pub fn unique_emails(&self) -> usize {
        self.keys()
            .iter()
            .map(|key| key.email.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Number of distinct emails in `emails`, compared case-insensitively.
    pub fn count_unique<'a>(emails: impl IntoIterator<Item = &'a str>) -> usize {
        emails
            .into_iter()
            .map(str::to_ascii_lowercase)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Restores keys from previously persisted results. Returns how many were new.
    pub fn seed(&self, keys: impl IntoIterator<Item = DedupKey>) -> usize {
        let mut guard = self.keys();
        keys.into_iter().filter(|key| guard.insert(key.clone())).count()
    }

    pub fn clear(&self) {
        self.keys().clear();
    }
}
