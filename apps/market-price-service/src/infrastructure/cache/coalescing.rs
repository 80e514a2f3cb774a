//! TTL cache with single-flight fetches.
//!
//! Concurrent misses on the same key share one underlying fetch. The fetch
//! publishes its own result, so a caller that drops its future mid-flight
//! cannot leave the key stuck.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::infrastructure::metrics::{self, CacheEvent};

type SharedFetch<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

/// A value read through the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cached<V> {
    /// The value.
    pub value: V,
    /// True when an expired value was served because the refresh failed.
    pub stale: bool,
}

impl<V> Cached<V> {
    const fn fresh(value: V) -> Self {
        Self {
            value,
            stale: false,
        }
    }

    const fn stale(value: V) -> Self {
        Self { value, stale: true }
    }
}

struct StoredValue<V> {
    value: V,
    expires_at: Instant,
}

struct InFlight<V, E> {
    id: u64,
    future: SharedFetch<V, E>,
}

struct Entry<V, E> {
    stored: Option<StoredValue<V>>,
    in_flight: Option<InFlight<V, E>>,
}

struct Inner<V, E> {
    entries: HashMap<String, Entry<V, E>>,
    next_fetch_id: u64,
}

enum Lookup<V, E> {
    Fresh(V),
    Pending {
        future: SharedFetch<V, E>,
        stale: Option<V>,
    },
}

/// Keyed TTL cache where concurrent misses share one fetch.
///
/// Failed fetches are never stored. Expired values are kept for
/// `stale_retention` past their expiry so callers may opt into serving
/// them when a refresh fails.
pub struct CoalescingCache<V, E> {
    namespace: &'static str,
    ttl: Duration,
    stale_retention: Duration,
    inner: Arc<Mutex<Inner<V, E>>>,
}

impl<V, E> CoalescingCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create an empty cache. `namespace` labels log lines and metrics.
    #[must_use]
    pub fn new(namespace: &'static str, ttl: Duration) -> Self {
        Self {
            namespace,
            ttl,
            stale_retention: ttl,
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                next_fetch_id: 0,
            })),
        }
    }

    /// How long expired values stay available for stale fallback.
    #[must_use]
    pub const fn with_stale_retention(mut self, retention: Duration) -> Self {
        self.stale_retention = retention;
        self
    }

    /// Namespace label.
    pub const fn namespace(&self) -> &'static str {
        self.namespace
    }

    /// Configured time-to-live.
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`, or the result of a single shared fetch.
    ///
    /// `fetch` is only invoked on a miss with no fetch already in flight,
    /// and is called while the cache lock is held: it must only build the
    /// future, not touch this cache.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        match self.lookup_or_start(key, fetch) {
            Lookup::Fresh(value) => Ok(value),
            Lookup::Pending { future, .. } => future.await,
        }
    }

    /// Like [`get_or_fetch`](Self::get_or_fetch), but falls back to an
    /// expired value when the fetch fails.
    pub async fn get_or_fetch_stale_ok<F, Fut>(&self, key: &str, fetch: F) -> Result<Cached<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        match self.lookup_or_start(key, fetch) {
            Lookup::Fresh(value) => Ok(Cached::fresh(value)),
            Lookup::Pending { future, stale } => match (future.await, stale) {
                (Ok(value), _) => Ok(Cached::fresh(value)),
                (Err(_), Some(value)) => {
                    tracing::warn!(namespace = self.namespace, key, "Refresh failed, serving stale value");
                    metrics::record_cache_event(self.namespace, CacheEvent::StaleServed);
                    Ok(Cached::stale(value))
                }
                (Err(e), None) => Err(e),
            },
        }
    }

    /// Fresh value for `key`, if any. Never fetches.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        self.inner
            .lock()
            .entries
            .get(key)
            .and_then(|entry| entry.stored.as_ref())
            .filter(|stored| stored.expires_at > now)
            .map(|stored| stored.value.clone())
    }

    /// Store `value` with a fresh TTL.
    ///
    /// A fetch already in flight for `key` still resolves its waiters but no
    /// longer writes its result.
    pub fn set(&self, key: &str, value: V) {
        let expires_at = Instant::now() + self.ttl;
        let mut inner = self.inner.lock();
        let entry = inner
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry {
                stored: None,
                in_flight: None,
            });
        entry.stored = Some(StoredValue { value, expires_at });
        entry.in_flight = None;
    }

    /// Drop `key`. Returns whether anything was removed.
    ///
    /// A fetch in flight for `key` completes for its waiters but its result
    /// is discarded.
    pub fn invalidate(&self, key: &str) -> bool {
        self.inner.lock().entries.remove(key).is_some()
    }

    /// Drop every key.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.entries.len();
        inner.entries.clear();
        tracing::debug!(namespace = self.namespace, dropped, "Cache cleared");
    }

    /// Number of tracked keys, including expired and in-flight ones.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// True when no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup_or_start<F, Fut>(&self, key: &str, fetch: F) -> Lookup<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let now = Instant::now();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if let Some(entry) = inner.entries.get(key) {
            let stale = match &entry.stored {
                Some(stored) if stored.expires_at > now => {
                    metrics::record_cache_event(self.namespace, CacheEvent::Hit);
                    return Lookup::Fresh(stored.value.clone());
                }
                Some(stored) => Some(stored.value.clone()),
                None => None,
            };
            if let Some(in_flight) = &entry.in_flight {
                metrics::record_cache_event(self.namespace, CacheEvent::Coalesced);
                return Lookup::Pending {
                    future: in_flight.future.clone(),
                    stale,
                };
            }
        }

        metrics::record_cache_event(self.namespace, CacheEvent::Miss);
        self.prune_expired(&mut inner.entries, now);

        inner.next_fetch_id += 1;
        let id = inner.next_fetch_id;
        let future = Self::publishing_fetch(
            Arc::downgrade(&self.inner),
            key.to_string(),
            id,
            self.ttl,
            fetch(),
        );

        let entry = inner
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry {
                stored: None,
                in_flight: None,
            });
        let stale = entry.stored.as_ref().map(|stored| stored.value.clone());
        entry.in_flight = Some(InFlight {
            id,
            future: future.clone(),
        });

        Lookup::Pending { future, stale }
    }

    /// Wrap `fetch` so that on completion it stores a success and clears
    /// its in-flight marker, unless the key was invalidated or replaced.
    fn publishing_fetch<Fut>(
        inner: Weak<Mutex<Inner<V, E>>>,
        key: String,
        id: u64,
        ttl: Duration,
        fetch: Fut,
    ) -> SharedFetch<V, E>
    where
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        async move {
            let result = fetch.await;
            let Some(inner) = inner.upgrade() else {
                return result;
            };
            let mut guard = inner.lock();
            let current = guard
                .entries
                .get(&key)
                .and_then(|entry| entry.in_flight.as_ref())
                .is_some_and(|in_flight| in_flight.id == id);
            if current {
                let keep_entry = if let Some(entry) = guard.entries.get_mut(&key) {
                    entry.in_flight = None;
                    if let Ok(value) = &result {
                        entry.stored = Some(StoredValue {
                            value: value.clone(),
                            expires_at: Instant::now() + ttl,
                        });
                    }
                    entry.stored.is_some()
                } else {
                    true
                };
                if !keep_entry {
                    guard.entries.remove(&key);
                }
            }
            result
        }
        .boxed()
        .shared()
    }

    /// Forget idle entries whose value expired more than `stale_retention` ago.
    fn prune_expired(&self, entries: &mut HashMap<String, Entry<V, E>>, now: Instant) {
        let retention = self.stale_retention;
        entries.retain(|_, entry| {
            entry.in_flight.is_some()
                || entry
                    .stored
                    .as_ref()
                    .is_some_and(|stored| stored.expires_at + retention > now)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(60);

    fn cache() -> CoalescingCache<u32, String> {
        CoalescingCache::new("test", TTL)
    }

    fn counting_fetch(
        calls: &Arc<AtomicUsize>,
        result: Result<u32, String>,
        delay: Duration,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<u32, String>> + use<> {
        let calls = Arc::clone(calls);
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                result
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_value_is_served_without_fetching() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get_or_fetch("k", counting_fetch(&calls, Ok(1), Duration::ZERO))
            .await;
        let second = cache
            .get_or_fetch("k", counting_fetch(&calls, Ok(2), Duration::ZERO))
            .await;

        assert_eq!(first, Ok(1));
        assert_eq!(second, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get("k"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_value_is_refetched() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_fetch("k", counting_fetch(&calls, Ok(1), Duration::ZERO))
            .await
            .unwrap();
        tokio::time::advance(TTL + Duration::from_secs(1)).await;

        assert_eq!(cache.get("k"), None);
        let refreshed = cache
            .get_or_fetch("k", counting_fetch(&calls, Ok(2), Duration::ZERO))
            .await;

        assert_eq!(refreshed, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_share_one_fetch() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));

        let waiters = (0..10).map(|_| {
            cache.get_or_fetch("k", counting_fetch(&calls, Ok(7), Duration::from_millis(100)))
        });
        let results = join_all(waiters).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| *r == Ok(7)));
    }

    #[tokio::test(start_paused = true)]
    async fn coalesced_failure_reaches_every_waiter_and_is_not_stored() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));

        let waiters = (0..5).map(|_| {
            cache.get_or_fetch(
                "k",
                counting_fetch(&calls, Err("down".to_string()), Duration::from_millis(50)),
            )
        });
        let results = join_all(waiters).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| *r == Err("down".to_string())));
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_ok_serves_expired_value_on_failure() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));

        cache.set("k", 1);
        tokio::time::advance(TTL + Duration::from_secs(1)).await;

        let result = cache
            .get_or_fetch_stale_ok("k", counting_fetch(&calls, Err("down".into()), Duration::ZERO))
            .await;

        assert_eq!(result, Ok(Cached { value: 1, stale: true }));
    }

    #[tokio::test(start_paused = true)]
    async fn strict_read_propagates_failure_despite_stale_value() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));

        cache.set("k", 1);
        tokio::time::advance(TTL + Duration::from_secs(1)).await;

        let result = cache
            .get_or_fetch("k", counting_fetch(&calls, Err("down".into()), Duration::ZERO))
            .await;

        assert_eq!(result, Err("down".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_ok_without_prior_value_propagates_failure() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));

        let result = cache
            .get_or_fetch_stale_ok("k", counting_fetch(&calls, Err("down".into()), Duration::ZERO))
            .await;

        assert_eq!(result, Err("down".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_during_flight_discards_result() {
        let cache = Arc::new(cache());
        let calls = Arc::new(AtomicUsize::new(0));

        let fetching = {
            let cache = Arc::clone(&cache);
            let fetch = counting_fetch(&calls, Ok(9), Duration::from_millis(100));
            tokio::spawn(async move { cache.get_or_fetch("k", fetch).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(cache.invalidate("k"));

        assert_eq!(fetching.await.unwrap(), Ok(9));
        assert_eq!(cache.get("k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_caller_does_not_wedge_key() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));

        let abandoned = cache.get_or_fetch("k", counting_fetch(&calls, Ok(3), Duration::from_secs(1)));
        let _ = tokio::time::timeout(Duration::from_millis(10), abandoned).await;

        let retried = cache
            .get_or_fetch("k", counting_fetch(&calls, Ok(4), Duration::ZERO))
            .await;

        // The retry joins the original fetch rather than starting another.
        assert_eq!(retried, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get("k"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_pruned_after_retention() {
        let cache = cache().with_stale_retention(Duration::from_secs(10));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.set("old", 1);
        tokio::time::advance(TTL + Duration::from_secs(11)).await;
        cache
            .get_or_fetch("new", counting_fetch(&calls, Ok(2), Duration::ZERO))
            .await
            .unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("new"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_drops_everything() {
        let cache = cache();
        cache.set("a", 1);
        cache.set("b", 2);

        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
    }
}
