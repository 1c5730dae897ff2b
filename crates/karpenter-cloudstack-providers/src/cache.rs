//! Keyed TTL cache with single-flight fetching
//!
//! Entries expire passively: an expired entry is treated as absent on read
//! and replaced on the next fetch. [`TtlCache::purge_expired`] can be called
//! periodically to reclaim memory, but nothing depends on it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default time-to-live of cached resource lists
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Keyed cache whose values expire after a TTL
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    /// Serializes cold-cache fetches
    fetch_lock: Mutex<()>,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            fetch_lock: Mutex::new(()),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Fresh value for `key`, if any
    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|entry| entry.is_fresh(Instant::now()))
            .map(|entry| entry.value.clone())
    }

    /// Store `value` under `key`, replacing any previous entry
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn delete(&self, key: &str) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        before - entries.len()
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached value for `key`, or the result of `fetch` stored with `ttl`
    ///
    /// Concurrent callers on a cold key wait for one another: the first one
    /// runs `fetch`, the others re-check after it finishes and observe the
    /// stored value. A failed fetch stores nothing; its error goes to the
    /// caller that ran it and the next waiter fetches again.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, ttl: Duration, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            tracing::debug!("Cache hit: {}", key);
            return Ok(value);
        }

        let _guard = self.fetch_lock.lock().await;

        if let Some(value) = self.get(key) {
            tracing::debug!("Cache hit after wait: {}", key);
            return Ok(value);
        }

        tracing::debug!("Cache miss, fetching: {}", key);
        let value = fetch().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_get_set_delete() {
        let cache = TtlCache::new(DEFAULT_TTL);
        assert_eq!(cache.get("zones"), None);

        cache.set("zones", vec!["zone-1".to_string()], DEFAULT_TTL);
        assert_eq!(cache.get("zones"), Some(vec!["zone-1".to_string()]));

        cache.delete("zones");
        assert_eq!(cache.get("zones"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache = TtlCache::new(DEFAULT_TTL);
        cache.set("networks-zone-1", 3u32, Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get("networks-zone-1"), Some(3));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("networks-zone-1"), None);
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_fetch_runs_once_for_concurrent_callers() {
        let cache = Arc::new(TtlCache::new(DEFAULT_TTL));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("zones", DEFAULT_TTL, || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok::<_, String>(42u32)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_is_not_cached() {
        let cache: TtlCache<u32> = TtlCache::new(DEFAULT_TTL);

        let result = cache
            .get_or_fetch("zones", DEFAULT_TTL, || async { Err("backend down") })
            .await;
        assert_eq!(result, Err("backend down"));
        assert_eq!(cache.get("zones"), None);

        let result = cache
            .get_or_fetch("zones", DEFAULT_TTL, || async { Ok::<_, &str>(7) })
            .await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_fetch_refetches_after_expiry() {
        let cache = TtlCache::new(DEFAULT_TTL);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = cache
                .get_or_fetch("templates-zone-1", Duration::from_secs(30), || async {
                    Ok::<_, String>(calls.fetch_add(1, Ordering::SeqCst))
                })
                .await
                .unwrap();
            assert_eq!(value, 0);
        }

        tokio::time::advance(Duration::from_secs(31)).await;

        let value = cache
            .get_or_fetch("templates-zone-1", Duration::from_secs(30), || async {
                Ok::<_, String>(calls.fetch_add(1, Ordering::SeqCst))
            })
            .await
            .unwrap();
        assert_eq!(value, 1);
    }
}
