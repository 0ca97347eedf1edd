//! Background Expiry Sweeper
//!
//! This module implements a background task that periodically scans the TTL
//! cache and evicts entries whose expiry has passed.
//!
//! ## Why Do We Need This?
//!
//! The cache already hides expired entries on access (lazy expiry), but an
//! entry that is never read again would otherwise stay in memory forever.
//! The sweeper reclaims those.
//!
//! ## Design
//!
//! The sweeper runs as a Tokio task and:
//! 1. Sleeps for a fixed interval (default: 5s)
//! 2. Wakes up and scans every shard of the cache
//! 3. Removes any expired entries found
//! 4. Logs statistics about the cleanup
//!
//! It keeps running until it is stopped explicitly or its handle is dropped.
//! There is no tick limit.

use crate::cache::TtlCache;
use crate::error::{StoreError, StoreResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Interval between sweeps (default: 5s)
    pub interval: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,

    /// Number of completed sweeps
    ticks: Arc<AtomicU64>,
}

impl ExpirySweeper {
    /// Starts the expiry sweeper on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SweeperUnavailable`] when called outside a
    /// tokio runtime.
    ///
    /// # Example
    ///
    /// ```
    /// use datastore_lite::cache::{ExpiryConfig, ExpirySweeper, TtlCache};
    /// use std::sync::Arc;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let cache = Arc::new(TtlCache::new());
    /// let sweeper = ExpirySweeper::start(cache, ExpiryConfig::default()).unwrap();
    ///
    /// // Sweeper runs in the background...
    ///
    /// // Dropping the sweeper will stop it
    /// drop(sweeper);
    /// # }
    /// ```
    pub fn start(cache: Arc<TtlCache>, config: ExpiryConfig) -> StoreResult<Self> {
        let handle = Handle::try_current().map_err(|_| StoreError::SweeperUnavailable)?;
        Ok(Self::start_on(&handle, cache, config))
    }

    /// Starts the expiry sweeper on the given runtime.
    pub fn start_on(handle: &Handle, cache: Arc<TtlCache>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ticks = Arc::new(AtomicU64::new(0));

        info!(
            interval_ms = config.interval.as_millis() as u64,
            "Background expiry sweeper started"
        );
        handle.spawn(sweeper_loop(cache, config, Arc::clone(&ticks), shutdown_rx));

        Self { shutdown_tx, ticks }
    }

    /// Stops the expiry sweeper.
    ///
    /// This is called automatically when the handle is dropped. Stopping an
    /// already stopped sweeper is a no-op.
    pub fn stop(&self) {
        if !*self.shutdown_tx.borrow() {
            let _ = self.shutdown_tx.send(true);
            info!("Background expiry sweeper stopped");
        }
    }

    /// Returns true until [`stop`](Self::stop) has been called.
    pub fn is_running(&self) -> bool {
        !*self.shutdown_tx.borrow()
    }

    /// Returns the number of sweeps completed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop.
async fn sweeper_loop(
    cache: Arc<TtlCache>,
    config: ExpiryConfig,
    ticks: Arc<AtomicU64>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        // Wait for the interval or shutdown signal
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let expired = if cache.is_empty() {
            0
        } else {
            cache.evict_expired()
        };
        let tick = ticks.fetch_add(1, Ordering::Relaxed) + 1;

        if expired > 0 {
            debug!(
                expired = expired,
                entries_remaining = cache.len(),
                "Expired cache entries evicted"
            );
        } else {
            trace!(tick = tick, "Expiry sweep found nothing to evict");
        }
    }
}

/// Starts the expiry sweeper with default configuration.
///
/// This is a convenience function for simple use cases.
pub fn start_expiry_sweeper(cache: Arc<TtlCache>) -> StoreResult<ExpirySweeper> {
    ExpirySweeper::start(cache, ExpiryConfig::default())
}
