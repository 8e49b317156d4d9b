//! Cache Notifier (C9): inserts a newly archived file into the external
//! cache-control DBM when caching is active. §4.7 step 7.
//!
//! The original backs this with a DBM file maintained by
//! `ngamsCacheControlThread`; that thread lives outside the core (§1). This
//! module only defines the notification contract and an in-process
//! implementation suitable for a single-process deployment or for tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

/// What the cache notifier needs to know about one newly archived file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheEntry {
    pub disk_id: String,
    pub file_id: String,
    pub file_version: i32,
    pub filename: String,
}

#[async_trait]
pub trait CacheNotifier: Send + Sync {
    async fn insert(&self, entry: CacheEntry);
}

/// No-op notifier used when caching is not active (§4.7 step 7: "If
/// caching is active").
pub struct NoopCacheNotifier;

#[async_trait]
impl CacheNotifier for NoopCacheNotifier {
    async fn insert(&self, _entry: CacheEntry) {}
}

/// In-process stand-in for the external cache-control DBM, sufficient for
/// single-process deployments and for tests.
#[derive(Default)]
pub struct InMemoryCacheNotifier {
    entries: Mutex<HashSet<CacheEntry>>,
}

impl InMemoryCacheNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, entry: &CacheEntry) -> bool {
        self.entries.lock().unwrap().contains(entry)
    }
}

#[async_trait]
impl CacheNotifier for InMemoryCacheNotifier {
    async fn insert(&self, entry: CacheEntry) {
        self.entries.lock().unwrap().insert(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn inserted_entry_is_observable() {
        let notifier = InMemoryCacheNotifier::new();
        let entry = CacheEntry {
            disk_id: "disk-1".to_string(),
            file_id: "X1".to_string(),
            file_version: 1,
            filename: "X1/X1.v1".to_string(),
        };
        notifier.insert(entry.clone()).await;
        assert!(notifier.contains(&entry));
    }
}
