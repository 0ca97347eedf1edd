//! Thread-Safe TTL Cache
//!
//! An in-memory view of the records that carry an expiry. For every cached
//! key it keeps two parallel mappings: key to serialized value, and key to the
//! absolute instant the entry expires.
//!
//! The cache is derived data. The backing file is the source of truth, and the
//! cache can be rebuilt from it at any time.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        TtlCache                             │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ values  │ │ values  │ │ values  │ │ values  │           │
//! │  │ expiry  │ │ expiry  │ │ expiry  │ │ expiry  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both mappings of a shard live behind the same lock, so a key is never
//! present in one and missing from the other. The sweeper locks one shard at a
//! time, which keeps foreground callers blocked for at most one shard's
//! eviction pass.
//!
//! Expired entries are unreachable even before the sweeper runs: `get` checks
//! the expiry instant and drops the entry on the spot (lazy expiry).

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// Number of shards in the cache.
const NUM_SHARDS: usize = 16;

/// The two parallel mappings for one shard.
#[derive(Debug, Default)]
struct ShardMaps {
    /// key -> serialized value
    values: HashMap<String, String>,
    /// key -> absolute expiry instant
    expiries: HashMap<String, Instant>,
}

impl ShardMaps {
    fn remove(&mut self, key: &str) -> bool {
        let had_value = self.values.remove(key).is_some();
        let had_expiry = self.expiries.remove(key).is_some();
        had_value || had_expiry
    }
}

#[derive(Debug, Default)]
struct Shard {
    maps: RwLock<ShardMaps>,
}

impl Shard {
    fn read(&self) -> RwLockReadGuard<'_, ShardMaps> {
        self.maps.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ShardMaps> {
        self.maps.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The in-memory TTL cache.
///
/// Designed to be wrapped in an `Arc` and shared between the
/// [`DataStore`](crate::DataStore) and the [`ExpirySweeper`](super::ExpirySweeper).
///
/// # Example
///
/// ```
/// use datastore_lite::cache::TtlCache;
/// use std::time::Duration;
///
/// let cache = TtlCache::new();
/// cache.put_for("session", r#"{"user":"Ariz"}"#, Duration::from_secs(60));
/// assert_eq!(cache.get("session").as_deref(), Some(r#"{"user":"Ariz"}"#));
///
/// cache.remove("session");
/// assert!(cache.is_empty());
/// ```
pub struct TtlCache {
    shards: Vec<Shard>,

    /// Number of live entries (approximate)
    entry_count: AtomicU64,

    /// Number of entries removed because they expired
    expired_count: AtomicU64,
}

impl std::fmt::Debug for TtlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("shards", &self.shards.len())
            .field("entries", &self.entry_count.load(Ordering::Relaxed))
            .field("expired", &self.expired_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TtlCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            shards: (0..NUM_SHARDS).map(|_| Shard::default()).collect(),
            entry_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    #[inline]
    fn shard(&self, key: &str) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % NUM_SHARDS]
    }

    /// Inserts `key` with an absolute expiry instant, replacing any previous entry.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>, expires_at: Instant) {
        let key = key.into();
        let mut maps = self.shard(&key).write();

        let is_new = !maps.values.contains_key(&key);
        maps.expiries.insert(key.clone(), expires_at);
        maps.values.insert(key, value.into());

        if is_new {
            self.entry_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Inserts `key` to expire `ttl` from now.
    ///
    /// Returns `false`, inserting nothing, if `now + ttl` is not a
    /// representable instant.
    pub fn put_for(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) -> bool {
        match Instant::now().checked_add(ttl) {
            Some(expires_at) => {
                self.put(key, value, expires_at);
                true
            }
            None => false,
        }
    }

    /// Gets the cached value for `key`.
    ///
    /// Returns `None` if the key is not cached or has expired. An expired
    /// entry found here is removed immediately.
    pub fn get(&self, key: &str) -> Option<String> {
        let shard = self.shard(key);

        {
            let maps = shard.read();
            match maps.expiries.get(key) {
                Some(&exp) if Instant::now() < exp => return maps.values.get(key).cloned(),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired - need the write lock to drop it
        let mut maps = shard.write();
        if let Some(&exp) = maps.expiries.get(key) {
            if Instant::now() >= exp {
                maps.remove(key);
                self.entry_count.fetch_sub(1, Ordering::Relaxed);
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            // Race: another caller re-inserted the key
            return maps.values.get(key).cloned();
        }

        None
    }

    /// Returns the expiry instant of a cached key.
    pub fn expires_at(&self, key: &str) -> Option<Instant> {
        self.shard(key).read().expiries.get(key).copied()
    }

    /// Checks if `key` is cached and not expired.
    pub fn contains(&self, key: &str) -> bool {
        self.shard(key)
            .read()
            .expiries
            .get(key)
            .map(|&exp| Instant::now() < exp)
            .unwrap_or(false)
    }

    /// Removes `key` from both mappings. Removing an absent key is a no-op.
    ///
    /// Returns `true` if the key was cached.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.shard(key).write().remove(key);
        if removed {
            self.entry_count.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Evicts every entry whose expiry instant has passed.
    ///
    /// Shards are locked one at a time. Returns the number of evicted entries.
    pub fn evict_expired(&self) -> u64 {
        self.evict_expired_at(Instant::now())
    }

    /// Evicts every entry whose expiry instant is at or before `now`.
    pub fn evict_expired_at(&self, now: Instant) -> u64 {
        let mut evicted = 0u64;

        for shard in &self.shards {
            let mut maps = shard.write();
            if maps.expiries.is_empty() {
                continue;
            }

            let expired: Vec<String> = maps
                .expiries
                .iter()
                .filter(|(_, exp)| **exp <= now)
                .map(|(key, _)| key.clone())
                .collect();

            for key in &expired {
                maps.remove(key);
            }
            evicted += expired.len() as u64;
        }

        if evicted > 0 {
            self.entry_count.fetch_sub(evicted, Ordering::Relaxed);
            self.expired_count.fetch_add(evicted, Ordering::Relaxed);
        }

        evicted
    }

    /// Clears every entry.
    pub fn clear(&self) {
        for shard in &self.shards {
            let mut maps = shard.write();
            maps.values.clear();
            maps.expiries.clear();
        }
        self.entry_count.store(0, Ordering::Relaxed);
    }

    /// Returns the approximate number of cached entries, including expired
    /// entries the sweeper has not reached yet.
    pub fn len(&self) -> u64 {
        self.entry_count.load(Ordering::Relaxed)
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the total number of entries removed because they expired.
    pub fn expired_count(&self) -> u64 {
        self.expired_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_get() {
        let cache = TtlCache::new();

        cache.put_for("key", "value", Duration::from_secs(60));
        assert_eq!(cache.get("key"), Some("value".to_string()));
        assert!(cache.contains("key"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_put_for_unrepresentable_ttl() {
        let cache = TtlCache::new();

        assert!(!cache.put_for("key", "value", Duration::from_secs(u64::MAX)));
        assert_eq!(cache.get("key"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_get_nonexistent() {
        let cache = TtlCache::new();
        assert_eq!(cache.get("nonexistent"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_replaces_entry() {
        let cache = TtlCache::new();

        cache.put_for("key", "old", Duration::from_secs(60));
        cache.put_for("key", "new", Duration::from_secs(60));
        assert_eq!(cache.get("key"), Some("new".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lazy_expiry() {
        let cache = TtlCache::new();

        cache.put_for("key", "value", Duration::from_millis(50));
        assert!(cache.contains("key"));

        std::thread::sleep(Duration::from_millis(100));

        assert!(!cache.contains("key"));
        assert_eq!(cache.get("key"), None);
        assert!(cache.expires_at("key").is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.expired_count(), 1);
    }

    #[test]
    fn test_remove() {
        let cache = TtlCache::new();

        cache.put_for("key", "value", Duration::from_secs(60));
        assert!(cache.remove("key"));
        assert_eq!(cache.get("key"), None);
        assert!(cache.expires_at("key").is_none());
        assert!(!cache.remove("key")); // Already removed
        assert!(cache.is_empty());
    }

    #[test]
    fn test_evict_expired() {
        let cache = TtlCache::new();
        let now = Instant::now();

        cache.put("key1", "v", now);
        cache.put("key2", "v", now);
        cache.put("key3", "v", now + Duration::from_secs(60));

        assert_eq!(cache.evict_expired_at(now), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("key3"));
        assert!(cache.expires_at("key1").is_none());
        assert_eq!(cache.expired_count(), 2);
    }

    #[test]
    fn test_evict_on_empty_cache() {
        let cache = TtlCache::new();
        assert_eq!(cache.evict_expired(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let cache = TtlCache::new();
        for i in 0..20 {
            cache.put_for(format!("key{}", i), "v", Duration::from_secs(60));
        }
        assert_eq!(cache.len(), 20);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("key0"), None);
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let cache = Arc::new(TtlCache::new());
        let mut handles = vec![];

        for i in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("key-{}-{}", i, j);
                    cache.put_for(key.clone(), "value", Duration::from_secs(60));
                    cache.get(&key);
                }
            }));
        }

        // Evict concurrently with the writers
        let sweeper = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for _ in 0..50 {
                    cache.evict_expired();
                }
            })
        };

        for handle in handles {
            handle.join().unwrap();
        }
        sweeper.join().unwrap();

        assert_eq!(cache.len(), 800);
    }
}
