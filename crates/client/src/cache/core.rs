//! Generic thread-safe cache with per-entry TTL expiration.
//!
//! Backs the resilient client's read caching: entries are created on a
//! cacheable success, read-only afterward, and removed on expiry check or
//! explicit clear. `get`/`insert` never trigger I/O.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::config::CacheConfig;
use crate::resilience::{Clock, SystemClock};

/// Entry stored in the cache
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.ttl
    }
}

/// Internal storage for cache entries
#[derive(Debug)]
struct CacheStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    entries: HashMap<K, CacheEntry<V>>,
    /// Tracks insertion order for deterministic eviction
    insertion_order: VecDeque<K>,
}

impl<K, V> CacheStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    fn new() -> Self {
        Self { entries: HashMap::new(), insertion_order: VecDeque::new() }
    }

    fn forget(&mut self, key: &K) {
        self.entries.remove(key);
        self.insertion_order.retain(|k| k != key);
    }
}

/// Generic thread-safe cache with per-entry TTL
///
/// # Type Parameters
/// - `K`: Key type (must be `Eq + Hash + Clone`)
/// - `V`: Value type (must be `Clone`)
/// - `C`: Clock type for time-based operations (defaults to `SystemClock`)
///
/// When constructed with a bounded [`CacheConfig`], inserting into a full
/// cache evicts the least-recently-inserted entry. `Clone` shares the
/// underlying storage.
///
/// # Example
/// ```
/// use std::time::Duration;
///
/// use relay_client::cache::{CacheConfig, TtlCache};
///
/// let cache: TtlCache<String, i32> = TtlCache::new(CacheConfig::bounded(50));
/// cache.insert("key".to_string(), 42, Duration::from_secs(300));
/// assert_eq!(cache.get(&"key".to_string()), Some(42));
/// ```
pub struct TtlCache<K, V, C = SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    storage: Arc<RwLock<CacheStorage<K, V>>>,
    config: CacheConfig,
    clock: Arc<C>,
}

impl<K, V> TtlCache<K, V, SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a new cache with the given configuration using the system clock
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<K, V, C> TtlCache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    /// Create a new cache with a custom clock (useful for testing)
    pub fn with_clock(config: CacheConfig, clock: C) -> Self {
        Self { storage: Arc::new(RwLock::new(CacheStorage::new())), config, clock: Arc::new(clock) }
    }

    /// Get a value from the cache
    ///
    /// Returns `None` if the key doesn't exist or the entry's TTL has
    /// elapsed; an expired entry is evicted on the way out. A hit returns
    /// the stored value with no other side effects.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut storage = self.write_storage();

        let expired = match storage.entries.get(key) {
            Some(entry) => entry.is_expired(self.clock.now()),
            None => return None,
        };

        if expired {
            storage.forget(key);
            debug!("cache entry expired");
            return None;
        }

        storage.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert a value with the given TTL
    ///
    /// Overwrites any existing entry for the key unconditionally. When the
    /// cache is bounded and full, the least-recently-inserted entry is
    /// evicted first.
    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        let mut storage = self.write_storage();

        if let Some(max_entries) = self.config.max_entries {
            if storage.entries.len() >= max_entries && !storage.entries.contains_key(&key) {
                if let Some(oldest) = storage.insertion_order.pop_front() {
                    storage.entries.remove(&oldest);
                    debug!("cache full, evicted least-recently-inserted entry");
                }
            }
        }

        let entry = CacheEntry { value, inserted_at: self.clock.now(), ttl };
        storage.entries.insert(key.clone(), entry);

        // An overwrite counts as a fresh insertion for eviction ordering
        storage.insertion_order.retain(|k| k != &key);
        storage.insertion_order.push_back(key);
    }

    /// Remove a value from the cache
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut storage = self.write_storage();
        storage.insertion_order.retain(|k| k != key);
        storage.entries.remove(key).map(|e| e.value)
    }

    /// Clear all entries from the cache
    pub fn clear(&self) {
        let mut storage = self.write_storage();
        storage.entries.clear();
        storage.insertion_order.clear();
    }

    /// Get the current number of entries (including not-yet-evicted expired
    /// ones)
    pub fn len(&self) -> usize {
        match self.storage.read() {
            Ok(storage) => storage.entries.len(),
            Err(poisoned) => poisoned.into_inner().entries.len(),
        }
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all expired entries, returning how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut storage = self.write_storage();

        let expired_keys: Vec<K> = storage
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &expired_keys {
            storage.forget(key);
        }

        expired_keys.len()
    }

    fn write_storage(&self) -> std::sync::RwLockWriteGuard<'_, CacheStorage<K, V>> {
        match self.storage.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("cache storage lock poisoned");
                poisoned.into_inner()
            }
        }
    }
}

impl<K, V, C> Clone for TtlCache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for cache::core.
    use super::*;
    use crate::resilience::MockClock;

    fn cache_with_clock(config: CacheConfig) -> (TtlCache<String, i32, MockClock>, MockClock) {
        let clock = MockClock::new();
        (TtlCache::with_clock(config, clock.clone()), clock)
    }

    #[test]
    fn test_insert_and_get() {
        let (cache, _clock) = cache_with_clock(CacheConfig::unbounded());

        cache.insert("a".to_string(), 1, Duration::from_secs(10));
        cache.insert("b".to_string(), 2, Duration::from_secs(10));

        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.get(&"b".to_string()), Some(2));
        assert_eq!(cache.get(&"c".to_string()), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_overwrite_existing() {
        let (cache, _clock) = cache_with_clock(CacheConfig::unbounded());

        cache.insert("key".to_string(), 1, Duration::from_secs(10));
        cache.insert("key".to_string(), 2, Duration::from_secs(10));

        assert_eq!(cache.get(&"key".to_string()), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_value_available_before_ttl() {
        let (cache, clock) = cache_with_clock(CacheConfig::unbounded());

        cache.insert("key".to_string(), 42, Duration::from_secs(10));
        clock.advance_secs(9);
        assert_eq!(cache.get(&"key".to_string()), Some(42));
    }

    #[test]
    fn test_expires_exactly_at_ttl() {
        let (cache, clock) = cache_with_clock(CacheConfig::unbounded());

        cache.insert("key".to_string(), 42, Duration::from_secs(10));
        clock.advance_secs(10);

        // now >= inserted_at + ttl: absent, and the entry is evicted
        assert_eq!(cache.get(&"key".to_string()), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_per_entry_ttl() {
        let (cache, clock) = cache_with_clock(CacheConfig::unbounded());

        cache.insert("short".to_string(), 1, Duration::from_secs(5));
        cache.insert("long".to_string(), 2, Duration::from_secs(60));

        clock.advance_secs(6);
        assert_eq!(cache.get(&"short".to_string()), None);
        assert_eq!(cache.get(&"long".to_string()), Some(2));
    }

    #[test]
    fn test_remove_and_clear() {
        let (cache, _clock) = cache_with_clock(CacheConfig::unbounded());

        cache.insert("a".to_string(), 1, Duration::from_secs(10));
        cache.insert("b".to_string(), 2, Duration::from_secs(10));

        assert_eq!(cache.remove(&"a".to_string()), Some(1));
        assert_eq!(cache.remove(&"a".to_string()), None);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_bounded_evicts_least_recently_inserted() {
        let (cache, _clock) = cache_with_clock(CacheConfig::bounded(2));

        cache.insert("a".to_string(), 1, Duration::from_secs(60));
        cache.insert("b".to_string(), 2, Duration::from_secs(60));
        cache.insert("c".to_string(), 3, Duration::from_secs(60)); // evicts "a"

        assert_eq!(cache.get(&"a".to_string()), None);
        assert_eq!(cache.get(&"b".to_string()), Some(2));
        assert_eq!(cache.get(&"c".to_string()), Some(3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_overwrite_refreshes_insertion_order() {
        let (cache, _clock) = cache_with_clock(CacheConfig::bounded(2));

        cache.insert("a".to_string(), 1, Duration::from_secs(60));
        cache.insert("b".to_string(), 2, Duration::from_secs(60));

        // Overwriting "a" makes it the most recent insertion
        cache.insert("a".to_string(), 10, Duration::from_secs(60));
        cache.insert("c".to_string(), 3, Duration::from_secs(60)); // evicts "b"

        assert_eq!(cache.get(&"a".to_string()), Some(10));
        assert_eq!(cache.get(&"b".to_string()), None);
        assert_eq!(cache.get(&"c".to_string()), Some(3));
    }

    #[test]
    fn test_cleanup_expired() {
        let (cache, clock) = cache_with_clock(CacheConfig::unbounded());

        cache.insert("a".to_string(), 1, Duration::from_secs(5));
        cache.insert("b".to_string(), 2, Duration::from_secs(5));
        cache.insert("c".to_string(), 3, Duration::from_secs(60));

        clock.advance_secs(6);
        assert_eq!(cache.cleanup_expired(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"c".to_string()), Some(3));
    }

    #[test]
    fn test_clone_shares_storage() {
        let (cache, _clock) = cache_with_clock(CacheConfig::unbounded());
        let clone = cache.clone();

        cache.insert("key".to_string(), 42, Duration::from_secs(10));
        assert_eq!(clone.get(&"key".to_string()), Some(42));

        clone.remove(&"key".to_string());
        assert_eq!(cache.get(&"key".to_string()), None);
    }

    #[test]
    fn test_thread_safety() {
        use std::thread;

        let cache: Arc<TtlCache<String, i32>> =
            Arc::new(TtlCache::new(CacheConfig::unbounded()));
        let mut handles = vec![];

        for i in 0..10 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for j in 0..10 {
                    cache.insert(format!("key-{i}-{j}"), i * 10 + j, Duration::from_secs(60));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 100);
    }
}
