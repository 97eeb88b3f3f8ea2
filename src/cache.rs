use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// In-memory TTL cache for page-data responses. The dashboard already treats
/// these aggregates as up-to-5s stale, so serving a cached copy inside that
/// window is free.
#[derive(Clone)]
pub struct ResponseCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    ttl: Duration,
}

#[derive(Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let entry = self.entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            drop(entry);
            self.entries.remove(key);
            return None;
        }

        Some(entry.value.clone())
    }

    pub fn insert(&self, key: String, value: Value) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Drop expired entries. Called opportunistically from a periodic task.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn returns_cached_value_within_ttl() {
        let cache = ResponseCache::new(Duration::from_secs(5));
        cache.insert("admin:dashboard".into(), json!({"total": 3}));

        assert_eq!(cache.get("admin:dashboard"), Some(json!({"total": 3})));
        assert_eq!(cache.get("admin:products"), None);
    }

    #[test]
    fn expired_entries_are_evicted() {
        let cache = ResponseCache::new(Duration::from_millis(0));
        cache.insert("k".into(), json!(1));

        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn purge_removes_only_expired() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.insert("fresh".into(), json!(1));
        cache.purge_expired();
        assert_eq!(cache.len(), 1);
    }
}
