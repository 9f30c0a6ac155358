//! TTL cache and debounced single-flight, per `§4.8`.
//!
//! Both primitives are keyed by an arbitrary `Eq + Hash + Clone` key so the
//! same implementation serves DR fetches, block-height caching, and the
//! oracle-program compile cache alike.

use std::{
    future::Future,
    hash::Hash as StdHash,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use tokio::sync::OnceCell;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// A map from `key` to `(value, expiresAt)`, with expired entries pruned on
/// access and at-most-one in-flight fetch per key via [`SingleFlight`].
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: DashMap<K, Entry<V>>,
    inflight: SingleFlight<K, V>,
}

impl<K, V> TtlCache<K, V>
where
    K: StdHash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
            inflight: SingleFlight::new(),
        }
    }

    /// Returns a fresh cached value, or `None` if absent/expired. Does not
    /// fetch; pairs with [`Self::insert`] for callers that want manual
    /// control, or use [`Self::get_or_fetch`] for the common case.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Dedupes concurrent fetches for the same key via single-flight and
    /// caches only `Ok` results — a failed fetch never poisons the cache.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Clone + Send + Sync + 'static,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let value = self.inflight.run(key.clone(), fetch).await?;
        self.insert(key, value.clone());
        Ok(value)
    }
}

struct Slot<V> {
    cell: OnceCell<Result<V, String>>,
    waiters: std::sync::atomic::AtomicUsize,
}

/// Keyed by `key`, concurrent callers for the same key await the same
/// in-flight future. The map entry is cleared once every attached caller has
/// read the result, whether or not it was an error.
pub struct SingleFlight<K, V> {
    inflight: DashMap<K, Arc<Slot<V>>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: StdHash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inflight: DashMap::new(),
        }
    }

    /// Runs `fetch` for `key` unless another caller is already in flight for
    /// the same key, in which case this call awaits that caller's result.
    pub async fn run<F, Fut, E>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Clone + Send + Sync + 'static + ToString + From<String>,
    {
        use std::sync::atomic::Ordering;

        let slot = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(Slot {
                    cell: OnceCell::new(),
                    waiters: std::sync::atomic::AtomicUsize::new(0),
                })
            })
            .clone();
        slot.waiters.fetch_add(1, Ordering::SeqCst);

        let result = slot
            .cell
            .get_or_init(|| async { fetch().await.map_err(|e| e.to_string()) })
            .await
            .clone();

        if slot.waiters.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Last attached caller: nobody else can still be holding this
            // slot, safe to evict so the next round re-fetches.
            self.inflight.remove_if(&key, |_, v| Arc::ptr_eq(v, &slot));
        }

        result.map_err(E::from)
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: StdHash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn ttl_cache_expires() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_millis(10));
        cache.insert("k", 1);
        assert_eq!(cache.get(&"k"), Some(1));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get(&"k"), None);
    }

    #[tokio::test]
    async fn get_or_fetch_dedupes_errors_without_poisoning() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        let calls2 = calls.clone();
        let first: Result<u32, String> = cache
            .get_or_fetch("k", || async move {
                calls2.fetch_add(1, Ordering::SeqCst);
                Err("boom".to_string())
            })
            .await;
        assert!(first.is_err());
        assert_eq!(cache.get(&"k"), None, "errors must not be cached");

        let calls3 = calls.clone();
        let second: Result<u32, String> = cache
            .get_or_fetch("k", || async move {
                calls3.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            })
            .await;
        assert_eq!(second, Ok(42));
        assert_eq!(cache.get(&"k"), Some(42));
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let flight: SingleFlight<&str, u32> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c1 = calls.clone();
        let c2 = calls.clone();
        let (a, b) = tokio::join!(
            flight.run("k", || async move {
                c1.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok::<_, String>(7u32)
            }),
            flight.run("k", || async move {
                c2.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(7u32)
            })
        );
        assert_eq!(a, Ok(7));
        assert_eq!(b, Ok(7));
    }
}
