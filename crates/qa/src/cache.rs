//! TTL cache for pipeline resources
//!
//! DashMap-backed, lazily evicted: entries are dropped when a lookup
//! finds them expired, never in the background. One-shot keys therefore
//! linger until their next lookup; acceptable for the small keyspace of
//! users and conversations this cache holds.

use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Generic TTL cache. Within the TTL the identical `Arc` is handed
/// back, so callers can rely on pointer identity for "same resource".
pub struct TtlCache<K, V> {
    entries: DashMap<K, (Arc<V>, Instant)>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Fresh entry or nothing; expired entries are evicted on the way
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                let (value, inserted_at) = entry.value();
                if inserted_at.elapsed() < self.ttl {
                    return Some(Arc::clone(value));
                }
                true
            },
            None => false,
        };

        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn insert(&self, key: K, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.entries
            .insert(key, (Arc::clone(&value), Instant::now()));
        value
    }

    /// Cached value, or the result of `build` inserted under `key`.
    /// Builder errors are not cached.
    pub async fn get_or_try_build<F, Fut, E>(&self, key: K, build: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let built = build().await?;
        Ok(self.insert(key, built))
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    /// Drop every entry whose key matches the predicate
    pub fn invalidate_if(&self, mut pred: impl FnMut(&K) -> bool) {
        self.entries.retain(|k, _| !pred(k));
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
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_same_arc_within_ttl() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_secs(60));
        let builds = AtomicUsize::new(0);

        let first = cache
            .get_or_try_build("k".to_string(), || async {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(7)
            })
            .await
            .unwrap();
        let second = cache
            .get_or_try_build("k".to_string(), || async {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(8)
            })
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rebuild_after_expiry() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_millis(10));

        let first = cache
            .get_or_try_build("k".to_string(), || async { Ok::<_, Infallible>(1) })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = cache
            .get_or_try_build("k".to_string(), || async { Ok::<_, Infallible>(2) })
            .await
            .unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(*second, 2);
    }

    #[tokio::test]
    async fn test_builder_error_not_cached() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_secs(60));

        let err = cache
            .get_or_try_build("k".to_string(), || async { Err::<u32, _>("boom") })
            .await
            .unwrap_err();
        assert_eq!(err, "boom");
        assert!(cache.is_empty());

        let ok = cache
            .get_or_try_build("k".to_string(), || async { Ok::<_, &str>(3) })
            .await
            .unwrap();
        assert_eq!(*ok, 3);
    }

    #[tokio::test]
    async fn test_invalidate_if() {
        let cache: TtlCache<(String, String), u32> = TtlCache::new(Duration::from_secs(60));
        cache.insert(("u1".to_string(), "c1".to_string()), 1);
        cache.insert(("u1".to_string(), "c2".to_string()), 2);
        cache.insert(("u2".to_string(), "c1".to_string()), 3);

        cache.invalidate_if(|(user, _)| user == "u1");
        assert_eq!(cache.len(), 1);
        assert!(cache
            .get(&("u2".to_string(), "c1".to_string()))
            .is_some());
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_secs(60));
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        assert_eq!(cache.len(), 2);

        cache.invalidate(&"a".to_string());
        assert!(cache.get(&"a".to_string()).is_none());
        assert!(cache.get(&"b".to_string()).is_some());

        cache.invalidate_all();
        assert!(cache.is_empty());
    }
}
