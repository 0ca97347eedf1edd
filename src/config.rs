//! Store configuration.
//!
//! The only option most callers care about is the backing file path. When it
//! is not set, the store lives at `DataStoreLite.txt` in the user's home
//! directory.
//!
//! Environment overrides (read by [`Config::from_env`]):
//!
//! - `DATASTORE_LITE_PATH` - backing file path
//! - `DATASTORE_LITE_SWEEP_SECS` - expiry sweep interval in seconds

use crate::cache::DEFAULT_SWEEP_INTERVAL;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// File name used when no path is configured.
pub const DEFAULT_FILE_NAME: &str = "DataStoreLite.txt";

/// Environment variable overriding the backing file path.
pub const ENV_PATH: &str = "DATASTORE_LITE_PATH";

/// Environment variable overriding the sweep interval, in seconds.
pub const ENV_SWEEP_SECS: &str = "DATASTORE_LITE_SWEEP_SECS";

/// Configuration for a [`DataStore`](crate::DataStore).
#[derive(Debug, Clone)]
pub struct Config {
    /// Backing file path
    pub path: PathBuf,
    /// Interval between expiry sweeps
    pub sweep_interval: Duration,
    /// `fsync` after every append and rewrite
    pub sync_writes: bool,
    /// Hide records whose TTL has elapsed from the disk fallback of `read`
    pub strict_expiry: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: default_path(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            sync_writes: false,
            strict_expiry: false,
        }
    }
}

impl Config {
    /// Creates a default configuration bound to `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self::default().with_path(path)
    }

    /// Builds a configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(path) = lookup(ENV_PATH).filter(|p| !p.trim().is_empty()) {
            config.path = PathBuf::from(path);
        }

        if let Some(raw) = lookup(ENV_SWEEP_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.sweep_interval = Duration::from_secs(secs),
                _ => warn!(
                    variable = ENV_SWEEP_SECS,
                    value = %raw,
                    "Ignoring invalid sweep interval"
                ),
            }
        }

        config
    }

    /// Sets the backing file path.
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = path.as_ref().to_path_buf();
        self
    }

    /// Sets the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Enables or disables `fsync` after writes.
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    /// Enables or disables hiding expired records on disk from `read`.
    pub fn with_strict_expiry(mut self, strict: bool) -> Self {
        self.strict_expiry = strict;
        self
    }
}

/// `<home>/DataStoreLite.txt`, or the current directory if there is no home.
pub fn default_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.path.ends_with(DEFAULT_FILE_NAME));
        assert_eq!(config.sweep_interval, Duration::from_secs(5));
        assert!(!config.sync_writes);
        assert!(!config.strict_expiry);
    }

    #[test]
    fn test_builders() {
        let config = Config::new("/tmp/store.txt")
            .with_sweep_interval(Duration::from_millis(100))
            .with_sync_writes(true)
            .with_strict_expiry(true);

        assert_eq!(config.path, PathBuf::from("/tmp/store.txt"));
        assert_eq!(config.sweep_interval, Duration::from_millis(100));
        assert!(config.sync_writes);
        assert!(config.strict_expiry);
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup(&[
            (ENV_PATH, "/var/lib/dslite/store.txt"),
            (ENV_SWEEP_SECS, "30"),
        ]));

        assert_eq!(config.path, PathBuf::from("/var/lib/dslite/store.txt"));
        assert_eq!(config.sweep_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let config = Config::from_lookup(lookup(&[(ENV_PATH, "  "), (ENV_SWEEP_SECS, "soon")]));
        assert_eq!(config.path, default_path());
        assert_eq!(config.sweep_interval, DEFAULT_SWEEP_INTERVAL);

        let config = Config::from_lookup(lookup(&[(ENV_SWEEP_SECS, "0")]));
        assert_eq!(config.sweep_interval, DEFAULT_SWEEP_INTERVAL);
    }
}
