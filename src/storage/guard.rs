//! File Access Guard
//!
//! Wraps the backing file in an advisory exclusive lock for the duration of
//! a single load, append or rewrite.
//!
//! The lock is best-effort and same-host only: it uses OS-level advisory
//! locking (`flock` on Unix, `LockFileEx` on Windows), which only stops other
//! holders that also ask for the lock. It gives no cross-process atomicity.
//!
//! Acquisition is non-blocking. If someone else already holds the lock the
//! caller gets [`StorageError::LockUnavailable`] straight away and may retry.
//!
//! The lock is released when the [`FileGuard`] is dropped, so every exit path
//! (success, decode failure, I/O failure, panic) releases it.

use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, trace};

/// An exclusive advisory lock on the backing file.
#[derive(Debug)]
pub struct FileGuard {
    /// The locked file handle, `None` once released
    file: Option<File>,
    /// Path of the locked file
    path: PathBuf,
}

impl FileGuard {
    /// Opens `path` for read/write and tries to lock it exclusively.
    ///
    /// # Errors
    ///
    /// - [`StorageError::FileNotFound`] if the file cannot be opened
    /// - [`StorageError::LockUnavailable`] if the lock is already held
    /// - [`StorageError::Io`] for any other locking failure
    pub fn acquire<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                error!(path = %path.display(), error = %e, "Could not open data store file");
                StorageError::FileNotFound(path.to_path_buf())
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                trace!(path = %path.display(), "Acquired data store lock");
                Ok(Self {
                    file: Some(file),
                    path: path.to_path_buf(),
                })
            }
            Err(e) if is_contended(&e) => {
                error!(path = %path.display(), "Data store is already in use by another process");
                Err(StorageError::LockUnavailable(path.to_path_buf()))
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to lock data store file");
                Err(StorageError::Io(e))
            }
        }
    }

    /// Returns the locked file handle.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the guard has already been released.
    pub fn file(&mut self) -> StorageResult<&mut File> {
        self.file.as_mut().ok_or_else(|| {
            StorageError::Io(io::Error::new(
                io::ErrorKind::Other,
                "data store lock has already been released",
            ))
        })
    }

    /// Returns the path of the locked file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true while the lock is held.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Releases the lock. Calling this on a released guard is a no-op.
    pub fn release(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                error!(path = %self.path.display(), error = %e, "Failed to release data store lock");
            } else {
                trace!(path = %self.path.display(), "Released data store lock");
            }
        }
    }
}

impl Drop for FileGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Some platforms report a held lock with a raw OS error instead of `WouldBlock`.
fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn store_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("store.txt");
        File::create(&path).unwrap();
        path
    }

    #[test]
    fn test_acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let path = store_file(&dir);

        let mut guard = FileGuard::acquire(&path).unwrap();
        assert!(guard.is_held());
        assert_eq!(guard.path(), path);

        guard.release();
        assert!(!guard.is_held());
        assert!(guard.file().is_err());
    }

    #[test]
    fn test_double_lock_fails() {
        let dir = TempDir::new().unwrap();
        let path = store_file(&dir);

        let _guard = FileGuard::acquire(&path).unwrap();

        let result = FileGuard::acquire(&path);
        assert!(matches!(result, Err(StorageError::LockUnavailable(_))));
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = store_file(&dir);

        {
            let _guard = FileGuard::acquire(&path).unwrap();
        }

        assert!(FileGuard::acquire(&path).is_ok());
    }

    #[test]
    fn test_release_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = store_file(&dir);

        let mut guard = FileGuard::acquire(&path).unwrap();
        guard.release();
        guard.release();
        drop(guard);

        assert!(FileGuard::acquire(&path).is_ok());
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = FileGuard::acquire(dir.path().join("missing.txt"));
        assert!(matches!(result, Err(StorageError::FileNotFound(_))));
    }

    #[test]
    fn test_guarded_file_is_writable() {
        let dir = TempDir::new().unwrap();
        let path = store_file(&dir);

        {
            let mut guard = FileGuard::acquire(&path).unwrap();
            guard.file().unwrap().write_all(b"hello\n").unwrap();
        }

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
    }
}
