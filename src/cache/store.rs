//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with per-entry TTL expiration.
//! Expired entries are dropped lazily when read and actively by the
//! background sweep task.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tracing::debug;

use crate::cache::stats::StatsCounters;
use crate::cache::{CacheEntry, CacheStats, DEFAULT_TTL, SHUTDOWN_GRACE, SWEEP_INTERVAL};
use crate::clock::{Clock, SystemClock};
use crate::error::{GuardError, Result};
use crate::tasks::{spawn_sweep_task, Sweep, SweepTask};

// == Compute Verdict ==
/// What [`TtlCache::compute`] should do with a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Compute<V> {
    /// Leave the current entry, and its expiration, untouched
    Keep,
    /// Remove the entry
    Remove,
    /// Replace the entry with a new value and TTL
    Put(V, Duration),
}

// == Shared State ==
/// State shared between the cache handle and its sweep task.
struct Shared<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    counters: StatsCounters,
    clock: Arc<dyn Clock>,
}

impl<K, V> Shared<K, V> {
    // A panic while holding the lock cannot leave the map half-updated, every
    // mutation is a single map call, so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> u64 {
        self.clock.now_millis()
    }
}

impl<K, V> Sweep for Shared<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn sweep(&self) -> usize {
        let now = self.now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        drop(entries);

        self.counters.record_evictions(removed as u64);
        removed
    }
}

// == TTL Cache ==
/// Thread-safe key/value store where every entry carries its own expiration.
///
/// Reads never return an expired value, whether or not the background sweep
/// has caught up. Writes are last-writer-wins per key; use
/// [`compute`](TtlCache::compute) for read-modify-write updates.
///
/// Construction spawns the sweep task and so must happen inside a Tokio
/// runtime.
pub struct TtlCache<K, V> {
    /// Label used in logs
    name: &'static str,
    shared: Arc<Shared<K, V>>,
    sweeper: Mutex<Option<SweepTask>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructors ==
    /// Creates a cache on the system clock with the default sweep interval.
    pub fn new(name: &'static str) -> Self {
        Self::with_settings(name, Arc::new(SystemClock), SWEEP_INTERVAL)
    }

    /// Creates a cache with an explicit clock and sweep interval.
    pub fn with_settings(
        name: &'static str,
        clock: Arc<dyn Clock>,
        sweep_interval: Duration,
    ) -> Self {
        let shared = Arc::new(Shared {
            entries: RwLock::new(HashMap::new()),
            counters: StatsCounters::default(),
            clock,
        });
        let sweeper = spawn_sweep_task(Arc::downgrade(&shared), name, sweep_interval);

        Self {
            name,
            shared,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    // == Put ==
    /// Stores a value that expires `ttl` from now, replacing any entry for
    /// the key.
    ///
    /// A zero `ttl` is rejected with [`GuardError::InvalidTtl`].
    pub fn put(&self, key: K, value: V, ttl: Duration) -> Result<()> {
        validate_ttl(ttl)?;
        let entry = CacheEntry::new(value, ttl, self.shared.now());
        self.shared.write().insert(key, entry);
        Ok(())
    }

    /// Stores a value with the default five minute TTL.
    pub fn put_default(&self, key: K, value: V) {
        let entry = CacheEntry::new(value, DEFAULT_TTL, self.shared.now());
        self.shared.write().insert(key, entry);
    }

    // == Get ==
    /// Returns the live value for `key`, counting a hit or a miss.
    ///
    /// An expired entry is evicted and reported as absent.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let value = self.lookup(key);
        if value.is_some() {
            self.shared.counters.record_hit();
        } else {
            self.shared.counters.record_miss();
        }
        value
    }

    /// Same as [`get`](TtlCache::get) without touching the hit/miss counters.
    pub fn get_if_present<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(key)
    }

    fn lookup<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.shared.now();
        {
            let entries = self.shared.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        // Re-check under the write lock: a writer may have replaced the
        // expired entry in between.
        let mut entries = self.shared.write();
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
            drop(entries);
            self.shared.counters.record_evictions(1);
            debug!(cache = self.name, "Evicted expired entry on read");
            return None;
        }
        entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    // == Compute ==
    /// Atomically updates the entry for `key`.
    ///
    /// `f` sees the live value (expired entries read as `None`) and decides
    /// what to store; no other operation on the cache can interleave. Returns
    /// the value present afterwards. If `f` asks for a zero TTL the entry is
    /// left as it was and [`GuardError::InvalidTtl`] is returned.
    pub fn compute<F>(&self, key: K, f: F) -> Result<Option<V>>
    where
        F: FnOnce(Option<&V>) -> Compute<V>,
    {
        let now = self.shared.now();
        let mut entries = self.shared.write();

        let expired = entries.get(&key).is_some_and(|entry| entry.is_expired(now));
        if expired {
            entries.remove(&key);
            self.shared.counters.record_evictions(1);
        }

        let current = entries.get(&key).map(|entry| &entry.value);
        match f(current) {
            Compute::Keep => Ok(entries.get(&key).map(|entry| entry.value.clone())),
            Compute::Remove => {
                entries.remove(&key);
                Ok(None)
            }
            Compute::Put(value, ttl) => {
                validate_ttl(ttl)?;
                let result = value.clone();
                entries.insert(key, CacheEntry::new(value, ttl, now));
                Ok(Some(result))
            }
        }
    }

    // == Invalidate ==
    /// Removes the entry for `key`, if any.
    pub fn invalidate<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.write().remove(key);
    }

    /// Removes every entry.
    pub fn invalidate_all(&self) {
        self.shared.write().clear();
    }

    // == Size ==
    /// Number of stored entries, counting expired ones the sweep has not
    /// reached yet.
    pub fn estimated_size(&self) -> usize {
        self.shared.read().len()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.shared.counters.snapshot(self.estimated_size())
    }

    // == Purge Expired ==
    /// Runs one sweep pass now and returns how many entries it removed.
    pub fn purge_expired(&self) -> usize {
        self.shared.sweep()
    }

    // == Shutdown ==
    /// Stops the background sweep, waiting a bounded time for it to exit.
    ///
    /// Calling it again is a no-op. The cache keeps working afterwards;
    /// expired entries are then only removed when read.
    pub async fn shutdown(&self) {
        let task = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(task) = task {
            task.stop(SHUTDOWN_GRACE).await;
        }
    }
}

fn validate_ttl(ttl: Duration) -> Result<()> {
    if ttl.is_zero() {
        return Err(GuardError::InvalidTtl(ttl));
    }
    Ok(())
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn manual_cache() -> (Arc<ManualClock>, TtlCache<String, String>) {
        let clock = Arc::new(ManualClock::new());
        let cache = TtlCache::with_settings("test", clock.clone(), SWEEP_INTERVAL);
        (clock, cache)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (_, cache) = manual_cache();

        cache
            .put("key1".into(), "value1".into(), Duration::from_secs(60))
            .unwrap();

        assert_eq!(cache.get("key1"), Some("value1".to_string()));
        assert_eq!(cache.estimated_size(), 1);
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let (_, cache) = manual_cache();

        assert_eq!(cache.get("nonexistent"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_put_rejects_zero_ttl() {
        let (_, cache) = manual_cache();

        let result = cache.put("key".into(), "value".into(), Duration::ZERO);
        assert!(matches!(result, Err(GuardError::InvalidTtl(_))));
        assert_eq!(cache.estimated_size(), 0);
    }

    #[tokio::test]
    async fn test_put_default_uses_five_minutes() {
        let (clock, cache) = manual_cache();

        cache.put_default("code".into(), "abcd".into());

        clock.advance(Duration::from_secs(299));
        assert!(cache.get("code").is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get("code").is_none());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_entry_and_ttl() {
        let (clock, cache) = manual_cache();

        cache
            .put("key1".into(), "value1".into(), Duration::from_secs(10))
            .unwrap();
        cache
            .put("key1".into(), "value2".into(), Duration::from_secs(100))
            .unwrap();

        clock.advance(Duration::from_secs(50));
        assert_eq!(cache.get("key1"), Some("value2".to_string()));
        assert_eq!(cache.estimated_size(), 1);
    }

    #[tokio::test]
    async fn test_ttl_expiration_counts_miss_and_eviction() {
        let (clock, cache) = manual_cache();

        cache
            .put("key1".into(), "value1".into(), Duration::from_secs(1))
            .unwrap();
        assert!(cache.get("key1").is_some());

        clock.advance(Duration::from_secs(1));

        assert_eq!(cache.get("key1"), None);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.total_entries, 0);
    }

    #[tokio::test]
    async fn test_get_if_present_does_not_count() {
        let (clock, cache) = manual_cache();

        cache
            .put("key1".into(), "value1".into(), Duration::from_secs(1))
            .unwrap();
        assert!(cache.get_if_present("key1").is_some());
        assert!(cache.get_if_present("missing").is_none());

        clock.advance(Duration::from_secs(2));
        assert!(cache.get_if_present("key1").is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        // Lazy removal still happened
        assert_eq!(stats.evictions, 1);
        assert_eq!(cache.estimated_size(), 0);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let (_, cache) = manual_cache();

        cache
            .put("key1".into(), "value1".into(), Duration::from_secs(60))
            .unwrap();
        cache.invalidate("key1");
        cache.invalidate("never-there");

        assert_eq!(cache.get("key1"), None);
        assert_eq!(cache.estimated_size(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let (_, cache) = manual_cache();

        for i in 0..10 {
            cache
                .put(format!("key{}", i), "v".into(), Duration::from_secs(60))
                .unwrap();
        }
        cache.invalidate_all();

        assert_eq!(cache.estimated_size(), 0);
    }

    #[tokio::test]
    async fn test_estimated_size_includes_unswept_entries() {
        let (clock, cache) = manual_cache();

        cache
            .put("short".into(), "v".into(), Duration::from_secs(1))
            .unwrap();
        cache
            .put("long".into(), "v".into(), Duration::from_secs(10))
            .unwrap();
        clock.advance(Duration::from_secs(5));

        assert_eq!(cache.estimated_size(), 2);

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.estimated_size(), 1);
        assert_eq!(cache.stats().evictions, 1);
        assert!(cache.get("long").is_some());
    }

    #[tokio::test]
    async fn test_compute_inserts_updates_and_removes() {
        let cache: TtlCache<&'static str, u32> =
            TtlCache::with_settings("test", Arc::new(ManualClock::new()), SWEEP_INTERVAL);
        let ttl = Duration::from_secs(60);

        let first = cache
            .compute("n", |cur| Compute::Put(cur.copied().unwrap_or(0) + 1, ttl))
            .unwrap();
        assert_eq!(first, Some(1));

        let second = cache
            .compute("n", |cur| Compute::Put(cur.copied().unwrap_or(0) + 1, ttl))
            .unwrap();
        assert_eq!(second, Some(2));

        let kept = cache.compute("n", |_| Compute::Keep).unwrap();
        assert_eq!(kept, Some(2));

        let removed = cache.compute("n", |_| Compute::Remove).unwrap();
        assert_eq!(removed, None);
        assert_eq!(cache.get_if_present("n"), None);
    }

    #[tokio::test]
    async fn test_compute_sees_expired_as_absent() {
        let clock = Arc::new(ManualClock::new());
        let cache: TtlCache<&'static str, u32> =
            TtlCache::with_settings("test", clock.clone(), SWEEP_INTERVAL);

        cache.put("n", 41, Duration::from_secs(1)).unwrap();
        clock.advance(Duration::from_secs(1));

        let mut seen = Some(0);
        cache
            .compute("n", |cur| {
                seen = cur.copied();
                Compute::Keep
            })
            .unwrap();

        assert_eq!(seen, None);
        assert_eq!(cache.estimated_size(), 0);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_compute_zero_ttl_leaves_entry() {
        let cache: TtlCache<&'static str, u32> =
            TtlCache::with_settings("test", Arc::new(ManualClock::new()), SWEEP_INTERVAL);

        cache.put("n", 1, Duration::from_secs(60)).unwrap();
        let result = cache.compute("n", |_| Compute::Put(2, Duration::ZERO));

        assert!(matches!(result, Err(GuardError::InvalidTtl(_))));
        assert_eq!(cache.get_if_present("n"), Some(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_compute_loses_no_updates() {
        let cache: Arc<TtlCache<String, u64>> = Arc::new(TtlCache::new("test"));
        let ttl = Duration::from_secs(60);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let cache = cache.clone();
                scope.spawn(move || {
                    for _ in 0..250 {
                        cache
                            .compute("counter".to_string(), |cur| {
                                Compute::Put(cur.copied().unwrap_or(0) + 1, ttl)
                            })
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(cache.get("counter"), Some(2_000));
    }

    #[tokio::test]
    async fn test_stats_summary_string() {
        let (_, cache) = manual_cache();

        cache
            .put("key1".into(), "value1".into(), Duration::from_secs(60))
            .unwrap();
        cache.get("key1");
        cache.get("nonexistent");

        assert_eq!(
            cache.stats().to_string(),
            "Cache{size=1, hits=1, misses=1, hitRate=50.0%, evictions=0}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweep_removes_unread_entries() {
        let clock = Arc::new(ManualClock::new());
        let cache: TtlCache<String, String> =
            TtlCache::with_settings("test", clock.clone(), Duration::from_secs(60));

        cache
            .put("write-once".into(), "v".into(), Duration::from_secs(5))
            .unwrap();
        cache
            .put("long-lived".into(), "v".into(), Duration::from_secs(3600))
            .unwrap();
        clock.advance(Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(cache.estimated_size(), 1);
        assert_eq!(cache.stats().evictions, 1);
        cache.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_is_idempotent_and_cache_keeps_working() {
        let (clock, cache) = manual_cache();

        cache.shutdown().await;
        cache.shutdown().await;

        cache
            .put("key".into(), "value".into(), Duration::from_secs(1))
            .unwrap();
        assert!(cache.get("key").is_some());

        clock.advance(Duration::from_secs(2));
        tokio::time::sleep(SWEEP_INTERVAL * 2).await;
        // No sweep ran, but reads still never see the stale value
        assert_eq!(cache.estimated_size(), 1);
        assert_eq!(cache.get("key"), None);
    }
}
