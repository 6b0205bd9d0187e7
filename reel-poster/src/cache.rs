//! Success cache of poster URLs known to load
//!
//! Append-only and never evicted. Resolvers receive the cache as an
//! injected capability; `process_cache()` is the shared instance hosts use
//! when they want every resolver in the process to benefit.

use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// Record of URLs that have loaded successfully at least once
///
/// A hit is an optimistic hint: the remote image may have changed since.
pub trait SuccessCache: Send + Sync {
    /// True if `url` previously loaded
    fn contains(&self, url: &str) -> bool;

    /// Insert if absent; returns true when `url` was newly recorded
    fn insert(&self, url: &str) -> bool;

    /// Number of recorded URLs
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory success cache guarded by an RwLock
#[derive(Debug, Default)]
pub struct MemorySuccessCache {
    urls: RwLock<HashSet<String>>,
}

impl MemorySuccessCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded URLs, sorted for stable output
    pub fn entries(&self) -> Vec<String> {
        let urls = self.urls.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut entries: Vec<String> = urls.iter().cloned().collect();
        entries.sort();
        entries
    }
}

impl SuccessCache for MemorySuccessCache {
    fn contains(&self, url: &str) -> bool {
        // A poisoned lock still holds a valid set: inserts cannot be half-applied
        self.urls
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(url)
    }

    fn insert(&self, url: &str) -> bool {
        let mut urls = self.urls.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if urls.contains(url) {
            return false;
        }
        urls.insert(url.to_string())
    }

    fn len(&self) -> usize {
        self.urls.read().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }
}

static PROCESS_CACHE: Lazy<Arc<MemorySuccessCache>> =
    Lazy::new(|| Arc::new(MemorySuccessCache::new()));

/// Process-wide success cache shared by all resolvers that opt into it
pub fn process_cache() -> Arc<MemorySuccessCache> {
    Arc::clone(&PROCESS_CACHE)
}
