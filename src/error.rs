//! Error types for DataStore Lite.
//!
//! Errors come in two layers:
//!
//! - [`StorageError`] is produced by the storage engine, the record codec and
//!   the file access guard. It describes what went wrong with the backing file.
//! - [`StoreError`] is what callers of [`DataStore`](crate::DataStore) see.
//!   Every storage failure reaches the caller wrapped in
//!   [`StoreError::IoFailure`], with the original error kept as its source.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or writing the backing file.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Another holder on this host already has the advisory lock.
    #[error("data store is already in use by another process: {}", .0.display())]
    LockUnavailable(PathBuf),

    /// The backing file could not be opened.
    #[error("could not find the data store file: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A line of the backing file does not follow the record format.
    #[error("malformed record: {reason}")]
    MalformedRecord { reason: String },

    /// The backing file has grown past the maximum allowed size.
    #[error("data store file is {size} bytes, exceeding the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },

    /// Any other read/write/flush failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    /// Shorthand for a [`StorageError::MalformedRecord`].
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        StorageError::MalformedRecord {
            reason: reason.into(),
        }
    }
}

/// Errors returned by the public `create` / `read` / `delete` operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key is too long or the document is too large.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A record with this key already exists.
    #[error("key already exists: {0}")]
    DuplicateKey(String),

    /// No record with this key exists.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// `delete` found no records at all in the backing file.
    #[error("data store is empty or unreadable")]
    StoreEmptyOrUnreadable,

    /// The backing file could not be read or written.
    #[error("I/O failure: {0}")]
    IoFailure(#[from] StorageError),

    /// The document could not be serialized or a stored value could not be parsed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store was opened outside of a tokio runtime, so the expiry sweeper
    /// has nowhere to run.
    #[error("no tokio runtime available to run the expiry sweeper")]
    SweeperUnavailable,
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        StoreError::IoFailure(StorageError::Io(err))
    }
}

impl StoreError {
    /// Returns true if this error came from the backing file rather than
    /// from the caller's input.
    pub fn is_io_failure(&self) -> bool {
        matches!(self, StoreError::IoFailure(_))
    }
}

/// Convenience alias used throughout the storage layer.
pub type StorageResult<T> = Result<T, StorageError>;

/// Convenience alias for façade operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::LockUnavailable(PathBuf::from("/tmp/store.txt"));
        assert!(err.to_string().contains("already in use"));

        let err = StorageError::malformed("missing key delimiter");
        assert_eq!(err.to_string(), "malformed record: missing key delimiter");

        let err = StorageError::FileTooLarge { size: 10, limit: 5 };
        assert!(err.to_string().contains("exceeding the 5 byte limit"));
    }

    #[test]
    fn test_guard_failures_surface_as_io_failure() {
        let err: StoreError = StorageError::FileNotFound(PathBuf::from("/missing")).into();
        assert!(err.is_io_failure());
        assert!(std::error::Error::source(&err).is_some());

        let err: StoreError = io::Error::new(io::ErrorKind::Other, "disk full").into();
        assert!(err.is_io_failure());

        assert!(!StoreError::KeyNotFound("k".into()).is_io_failure());
    }
}
