//! DataStore Façade
//!
//! The public `create` / `read` / `delete` surface. It composes the
//! validators, the storage engine and the TTL cache.
//!
//! ## Key lifecycle
//!
//! ```text
//!   Absent ──create──> Live (no ttl) ───────────────────────┐
//!     ▲       │                                             │
//!     │       └──────> Live (ttl) ──expiry──> on disk only ─┤
//!     │                                                     │
//!     └──────────────────────── delete ─────────────────────┘
//! ```
//!
//! ## Cache expiry, not data expiry
//!
//! A TTL controls how long a record stays in the in-memory cache. Once it
//! elapses the record is evicted from the cache, but its line stays in the
//! backing file until the key is deleted. By default `read` still finds such
//! a record through the disk scan. Set
//! [`Config::strict_expiry`](crate::Config::strict_expiry) to report
//! [`StoreError::KeyNotFound`] for it instead.
//!
//! ## Concurrency
//!
//! Every operation that touches the backing file runs inside one mutex per
//! store, so `create` (duplicate check, then append) and `delete` (load, then
//! rewrite) are linearizable within the process. Cache hits in `read` skip
//! the mutex entirely. The file guard adds best-effort protection against
//! other processes on the same host.

use crate::cache::{ExpiryConfig, ExpirySweeper, TtlCache};
use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::storage::{now_millis, Record, StorageEngine};
use crate::validation::{
    validate_document_size, validate_key, MAX_DOCUMENT_SIZE, MAX_KEY_LENGTH,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Store statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Total `create` calls
    pub creates: u64,
    /// Total `read` calls
    pub reads: u64,
    /// Total `delete` calls
    pub deletes: u64,
    /// `read` calls answered from the TTL cache
    pub cache_hits: u64,
    /// Entries currently in the TTL cache
    pub cached_entries: u64,
    /// Entries evicted from the TTL cache because they expired
    pub expired_entries: u64,
}

/// An embedded, single-file JSON key-value store.
///
/// The store owns its TTL cache and the background sweeper that evicts
/// expired entries from it. Both are torn down when the store is dropped.
///
/// # Example
///
/// ```
/// use datastore_lite::{Config, DataStore};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), datastore_lite::StoreError> {
/// let dir = tempfile::tempdir().unwrap();
/// let store = DataStore::open(Config::new(dir.path().join("store.txt")))?;
///
/// store.create("DSL001", &json!({"name01": "Name001"}))?;
/// store.create_with_ttl("session", &json!({"user": "Ariz"}), 30)?;
///
/// assert_eq!(store.read("DSL001")?, json!({"name01": "Name001"}));
///
/// store.delete("DSL001")?;
/// assert!(store.read("DSL001").is_err());
/// # Ok(())
/// # }
/// ```
pub struct DataStore {
    engine: StorageEngine,
    cache: Arc<TtlCache>,
    sweeper: ExpirySweeper,

    /// Serializes file access within this process
    file_lock: Mutex<()>,

    strict_expiry: bool,

    create_count: AtomicU64,
    read_count: AtomicU64,
    delete_count: AtomicU64,
    cache_hit_count: AtomicU64,
}

impl std::fmt::Debug for DataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStore")
            .field("path", &self.engine.path())
            .field("cache", &self.cache)
            .field("strict_expiry", &self.strict_expiry)
            .finish()
    }
}

impl DataStore {
    /// Opens (creating if needed) the store described by `config`.
    ///
    /// Must be called from within a tokio runtime, which hosts the expiry
    /// sweeper. TTL records already on disk that have not expired are loaded
    /// into the cache with their remaining lifetime.
    ///
    /// # Errors
    ///
    /// Fails if the backing file cannot be created or read, or with
    /// [`StoreError::SweeperUnavailable`] outside a tokio runtime.
    pub fn open(config: Config) -> StoreResult<Self> {
        let cache = Arc::new(TtlCache::new());
        let sweeper = ExpirySweeper::start(
            Arc::clone(&cache),
            ExpiryConfig {
                interval: config.sweep_interval,
            },
        )?;

        let engine = StorageEngine::open(&config.path, config.sync_writes)?;

        let store = Self {
            engine,
            cache,
            sweeper,
            file_lock: Mutex::new(()),
            strict_expiry: config.strict_expiry,
            create_count: AtomicU64::new(0),
            read_count: AtomicU64::new(0),
            delete_count: AtomicU64::new(0),
            cache_hit_count: AtomicU64::new(0),
        };

        let warmed = store.warm_cache()?;
        info!(
            path = %store.engine.path().display(),
            cached = warmed,
            "Data store opened"
        );
        Ok(store)
    }

    /// Opens the store at the configured default location.
    pub fn open_default() -> StoreResult<Self> {
        Self::open(Config::from_env())
    }

    /// Stores `value` under `key` with no expiry.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidArgument`] if the key or document is too large
    /// - [`StoreError::DuplicateKey`] if `key` already exists
    /// - [`StoreError::IoFailure`] if the backing file cannot be accessed
    pub fn create<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        self.create_with_ttl(key, value, 0)
    }

    /// Stores `value` under `key`, cached for `ttl_seconds` (`0` = forever).
    pub fn create_with_ttl<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> StoreResult<()> {
        self.create_count.fetch_add(1, Ordering::Relaxed);

        check_key(key)?;
        let serialized = serde_json::to_string(value)?;
        if !validate_document_size(&serialized) {
            warn!(key = %key, size = serialized.len(), "Document too large");
            return Err(StoreError::InvalidArgument(format!(
                "document is {} bytes, the maximum is {}",
                serialized.len(),
                MAX_DOCUMENT_SIZE
            )));
        }

        let expires_at = if ttl_seconds > 0 {
            let expires_at = Instant::now().checked_add(Duration::from_secs(ttl_seconds));
            Some(expires_at.ok_or_else(|| {
                warn!(key = %key, ttl = ttl_seconds, "TTL out of range");
                StoreError::InvalidArgument(format!("ttl of {} seconds is out of range", ttl_seconds))
            })?)
        } else {
            None
        };

        let _guard = self.lock_file();

        if self.engine.load_all()?.contains_key(key) {
            warn!(key = %key, "Key already exists");
            return Err(StoreError::DuplicateKey(key.to_string()));
        }

        let record = Record::new(key, serialized, ttl_seconds);
        self.engine.append(&record)?;

        if let Some(expires_at) = expires_at {
            self.cache.put(record.key, record.value, expires_at);
        }

        debug!(key = %key, ttl = ttl_seconds, "Created record");
        Ok(())
    }

    /// Reads the document stored under `key`.
    ///
    /// Cached TTL records are answered from memory; everything else is found
    /// by scanning the backing file.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidArgument`] if the key is too long
    /// - [`StoreError::KeyNotFound`] if no record exists
    /// - [`StoreError::IoFailure`] if the backing file cannot be accessed
    /// - [`StoreError::Serialization`] if the stored value is not valid JSON
    pub fn read(&self, key: &str) -> StoreResult<Value> {
        self.read_as(key)
    }

    /// Reads the document stored under `key` and deserializes it as `T`.
    pub fn read_as<T: DeserializeOwned>(&self, key: &str) -> StoreResult<T> {
        self.read_count.fetch_add(1, Ordering::Relaxed);
        check_key(key)?;

        if !self.cache.is_empty() {
            if let Some(value) = self.cache.get(key) {
                self.cache_hit_count.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Read served from cache");
                return Ok(serde_json::from_str(&value)?);
            }
        }

        let snapshot = {
            let _guard = self.lock_file();
            self.engine.load_all()?
        };

        match snapshot.get(key) {
            Some(record) if self.strict_expiry && record.is_expired_at(now_millis()) => {
                debug!(key = %key, "Record on disk has expired");
                Err(StoreError::KeyNotFound(key.to_string()))
            }
            Some(record) => Ok(serde_json::from_str(&record.value)?),
            None => Err(StoreError::KeyNotFound(key.to_string())),
        }
    }

    /// Deletes the record stored under `key`.
    ///
    /// Deleting a key that does not exist is not an error, provided the
    /// store holds at least one record.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidArgument`] if the key is too long
    /// - [`StoreError::StoreEmptyOrUnreadable`] if the store has no records
    /// - [`StoreError::IoFailure`] if the backing file cannot be accessed
    pub fn delete(&self, key: &str) -> StoreResult<()> {
        self.delete_count.fetch_add(1, Ordering::Relaxed);
        check_key(key)?;

        let _guard = self.lock_file();

        if self.engine.load_all()?.is_empty() {
            warn!(key = %key, "Delete on an empty data store");
            return Err(StoreError::StoreEmptyOrUnreadable);
        }

        self.cache.remove(key);

        if self.engine.rewrite_without(key)? {
            debug!(key = %key, "Deleted record");
        } else {
            warn!(key = %key, "Key not found, nothing deleted");
        }
        Ok(())
    }

    /// Checks if a record exists for `key` in the backing file.
    pub fn contains_key(&self, key: &str) -> StoreResult<bool> {
        let _guard = self.lock_file();
        Ok(self.engine.load_all()?.contains_key(key))
    }

    /// Returns the number of records in the backing file.
    pub fn len(&self) -> StoreResult<usize> {
        let _guard = self.lock_file();
        Ok(self.engine.load_all()?.len())
    }

    /// Returns true if the backing file holds no records.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        self.engine.path()
    }

    /// Returns the TTL cache, for inspection independent of the disk.
    pub fn ttl_cache(&self) -> &TtlCache {
        &self.cache
    }

    /// Returns the expiry sweeper handle.
    pub fn sweeper(&self) -> &ExpirySweeper {
        &self.sweeper
    }

    /// Stops the expiry sweeper. Reads, writes and lazy cache expiry keep
    /// working; expired entries are simply no longer swept.
    pub fn shutdown(&self) {
        self.sweeper.stop();
    }

    /// Returns store statistics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            creates: self.create_count.load(Ordering::Relaxed),
            reads: self.read_count.load(Ordering::Relaxed),
            deletes: self.delete_count.load(Ordering::Relaxed),
            cache_hits: self.cache_hit_count.load(Ordering::Relaxed),
            cached_entries: self.cache.len(),
            expired_entries: self.cache.expired_count(),
        }
    }

    fn lock_file(&self) -> MutexGuard<'_, ()> {
        self.file_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads unexpired TTL records from disk into the cache.
    fn warm_cache(&self) -> StoreResult<usize> {
        let snapshot = {
            let _guard = self.lock_file();
            self.engine.load_all()?
        };

        let now = now_millis();
        let mut warmed = 0;
        for record in snapshot.iter() {
            match record.remaining_ms(now) {
                Some(remaining) if remaining > 0 => {
                    let ttl = Duration::from_millis(remaining);
                    if self.cache.put_for(record.key.as_str(), record.value.as_str(), ttl) {
                        warmed += 1;
                    }
                }
                _ => {}
            }
        }
        Ok(warmed)
    }
}

fn check_key(key: &str) -> StoreResult<()> {
    if validate_key(key) {
        return Ok(());
    }
    warn!(key = %key, "Key too long");
    Err(StoreError::InvalidArgument(format!(
        "key is {} bytes, the maximum is {}",
        key.len(),
        MAX_KEY_LENGTH
    )))
}
