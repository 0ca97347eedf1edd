//! File-Backed Storage Engine
//!
//! This module implements the storage engine for DataStore Lite.
//! It owns the path of the backing file and exposes the three primitives the
//! façade is built from: load everything, append one record, and rewrite the
//! file without one key.
//!
//! ## Design Decisions
//!
//! 1. **One line per record**: The file is append-oriented; `create` never
//!    touches existing lines.
//! 2. **Full scans**: Every load reads the whole file. There is no index, so
//!    loads and rewrites are O(total records).
//! 3. **Guarded access**: Every operation holds a [`FileGuard`] for its whole
//!    duration and releases it on every exit path.
//! 4. **Rewrite via rename**: Survivors are written to a temporary file in the
//!    same directory which then replaces the backing file, so a crash mid
//!    rewrite leaves either the old or the new file in place.
//!
//! ## Data Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │                                                             │
//! │  load_all() ──> FileGuard ──> read lines ──> Record::decode │
//! │  append()   ──> FileGuard ──> Record::encode ──> write+flush│
//! │  rewrite_without()                                          │
//! │             ──> FileGuard ──> read ──> temp file ──> rename │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The guard is a cooperative, same-host lock. Callers sharing one engine
//! inside a process must serialize their calls themselves; the
//! [`DataStore`](crate::DataStore) does this with a mutex.

use crate::error::{StorageError, StorageResult};
use crate::storage::guard::FileGuard;
use crate::storage::record::Record;
use crate::validation::{validate_file_size, MAX_FILE_SIZE};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// The records found in the backing file by a single load.
///
/// Keys are unique. If the file holds the same key more than once, the last
/// line wins but keeps the position of the first occurrence.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Records in file order
    records: Vec<Record>,
    /// Key to position in `records`
    index: HashMap<String, usize>,
    /// Number of lines that failed to decode and were skipped
    malformed_lines: usize,
}

impl Snapshot {
    /// Inserts a record, replacing any record with the same key.
    fn insert(&mut self, record: Record) {
        match self.index.get(&record.key) {
            Some(&pos) => self.records[pos] = record,
            None => {
                self.index.insert(record.key.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    /// Removes a record by key.
    pub fn remove(&mut self, key: &str) -> Option<Record> {
        let pos = self.index.remove(key)?;
        let removed = self.records.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    /// Gets a record by key.
    pub fn get(&self, key: &str) -> Option<&Record> {
        self.index.get(key).map(|&pos| &self.records[pos])
    }

    /// Checks if a key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no records were loaded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over records in file order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Number of lines skipped because they could not be decoded.
    pub fn malformed_lines(&self) -> usize {
        self.malformed_lines
    }

    /// Consumes the snapshot, returning a key to serialized-value map.
    pub fn into_values(self) -> HashMap<String, String> {
        self.records.into_iter().map(|r| (r.key, r.value)).collect()
    }
}

/// The storage engine bound to one backing file.
///
/// # Example
///
/// ```
/// use datastore_lite::storage::{Record, StorageEngine};
///
/// let dir = tempfile::tempdir().unwrap();
/// let engine = StorageEngine::open(dir.path().join("store.txt"), false).unwrap();
///
/// engine.append(&Record::new("name", r#""Ariz""#, 0)).unwrap();
/// let snapshot = engine.load_all().unwrap();
/// assert_eq!(snapshot.get("name").unwrap().value, r#""Ariz""#);
///
/// assert!(engine.rewrite_without("name").unwrap());
/// assert!(engine.load_all().unwrap().is_empty());
/// ```
#[derive(Debug)]
pub struct StorageEngine {
    /// The backing file
    path: PathBuf,
    /// `fsync` after every write
    sync_writes: bool,
}

impl StorageEngine {
    /// Binds an engine to `path`, creating the file and its parent
    /// directory if they do not exist yet.
    pub fn open<P: AsRef<Path>>(path: P, sync_writes: bool) -> StorageResult<Self> {
        let engine = Self {
            path: path.as_ref().to_path_buf(),
            sync_writes,
        };
        engine.ensure_file()?;
        Ok(engine)
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every record in the backing file.
    ///
    /// Returns an empty snapshot if the file is missing or empty. Lines that
    /// fail to decode are skipped and counted, not treated as fatal.
    ///
    /// # Errors
    ///
    /// Fails with [`StorageError::FileTooLarge`] if the file is over
    /// [`MAX_FILE_SIZE`], or with a guard/I/O error.
    pub fn load_all(&self) -> StorageResult<Snapshot> {
        if !self.path.exists() {
            return Ok(Snapshot::default());
        }

        let mut guard = FileGuard::acquire(&self.path)?;
        let file = guard.file()?;
        check_file_size(file, 0)?;

        let snapshot = read_records(file)?;
        if snapshot.malformed_lines() > 0 {
            warn!(
                path = %self.path.display(),
                skipped = snapshot.malformed_lines(),
                "Skipped malformed records while loading"
            );
        }
        debug!(path = %self.path.display(), records = snapshot.len(), "Loaded data store");
        Ok(snapshot)
    }

    /// Appends one record as a new line and flushes it.
    pub fn append(&self, record: &Record) -> StorageResult<()> {
        self.ensure_file()?;

        let mut line = record.encode();
        line.push('\n');

        let mut guard = FileGuard::acquire(&self.path)?;
        let file = guard.file()?;
        check_file_size(file, line.len() as u64)?;

        file.seek(SeekFrom::End(0))?;
        let mut writer = BufWriter::new(&mut *file);
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        drop(writer);

        if self.sync_writes {
            file.sync_data()?;
        }

        debug!(key = %record.key, ttl = record.ttl_seconds, "Appended record");
        Ok(())
    }

    /// Rewrites the backing file with every record except `key`.
    ///
    /// Returns `true` if `key` was present. The file is rewritten even when
    /// it was not, which also drops malformed and duplicate lines.
    pub fn rewrite_without(&self, key: &str) -> StorageResult<bool> {
        self.ensure_file()?;

        let mut guard = FileGuard::acquire(&self.path)?;
        let file = guard.file()?;
        check_file_size(file, 0)?;
        let permissions = file.metadata()?.permissions();

        let mut snapshot = read_records(file)?;
        let removed = snapshot.remove(key).is_some();

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut temp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            for record in snapshot.iter() {
                writer.write_all(record.encode().as_bytes())?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        // Keep the store's mode; tempfile creates its files owner-only
        temp.as_file().set_permissions(permissions)?;
        if self.sync_writes {
            temp.as_file().sync_all()?;
        }
        temp.persist(&self.path).map_err(|e| StorageError::Io(e.error))?;

        // The guard still locks the replaced inode; dropping it releases that.
        guard.release();

        debug!(
            key = %key,
            removed = removed,
            remaining = snapshot.len(),
            "Rewrote data store"
        );
        Ok(removed)
    }

    /// Creates the backing file (and parent directory) if it is missing.
    fn ensure_file(&self) -> StorageResult<()> {
        if self.path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        info!(path = %self.path.display(), "Data store file created");
        Ok(())
    }
}

/// Fails if the file plus `incoming` bytes would exceed the size limit.
fn check_file_size(file: &File, incoming: u64) -> StorageResult<()> {
    let size = file.metadata()?.len();
    if !validate_file_size(size.saturating_add(incoming)) {
        warn!(size = size, limit = MAX_FILE_SIZE, "Data store file exceeds maximum size");
        return Err(StorageError::FileTooLarge {
            size,
            limit: MAX_FILE_SIZE,
        });
    }
    Ok(())
}

/// Reads and decodes every line from the start of `file`.
fn read_records(file: &mut File) -> StorageResult<Snapshot> {
    file.seek(SeekFrom::Start(0))?;

    let mut snapshot = Snapshot::default();
    let reader = BufReader::new(&mut *file);

    for (lineno, line) in reader.split(b'\n').enumerate() {
        let line = line?;
        if line.is_empty() || line == b"\r" {
            continue;
        }

        let decoded = String::from_utf8(line)
            .map_err(|_| StorageError::malformed("line is not valid UTF-8"))
            .and_then(|text| Record::decode(&text));

        match decoded {
            Ok(record) => snapshot.insert(record),
            Err(e) => {
                warn!(line = lineno + 1, error = %e, "Skipping malformed record");
                snapshot.malformed_lines += 1;
            }
        }
    }

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine(dir: &TempDir) -> StorageEngine {
        StorageEngine::open(dir.path().join("store.txt"), false).unwrap()
    }

    fn record(key: &str, value: &str, ttl: u64) -> Record {
        Record::new(key, value, ttl)
    }

    #[test]
    fn test_open_creates_file_and_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.txt");

        let engine = StorageEngine::open(&path, false).unwrap();
        assert!(path.exists());
        assert_eq!(engine.path(), path);
        assert!(engine.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        fs::remove_file(engine.path()).unwrap();

        assert!(engine.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_append_and_load() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);

        engine.append(&record("A", r#"{"x":1}"#, 0)).unwrap();
        engine.append(&record("B", r#"{"y":2}"#, 2)).unwrap();

        let snapshot = engine.load_all().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("A").unwrap().value, r#"{"x":1}"#);
        assert_eq!(snapshot.get("B").unwrap().ttl_seconds, 2);

        let contents = fs::read_to_string(engine.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.ends_with('\n'));
    }

    #[test]
    fn test_append_recreates_missing_file() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        fs::remove_file(engine.path()).unwrap();

        engine.append(&record("A", "1", 0)).unwrap();
        assert!(engine.load_all().unwrap().contains_key("A"));
    }

    #[test]
    fn test_duplicate_lines_last_write_wins() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);

        engine.append(&record("A", "1", 0)).unwrap();
        engine.append(&record("B", "2", 0)).unwrap();
        engine.append(&record("A", "3", 0)).unwrap();

        let snapshot = engine.load_all().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("A").unwrap().value, "3");

        let keys: Vec<_> = snapshot.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["A", "B"]);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);

        fs::write(
            engine.path(),
            "A#@@@#1###0###10\ngarbage\nB#@@@#2\n\nC#@@@#3###0###30\n",
        )
        .unwrap();

        let snapshot = engine.load_all().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.malformed_lines(), 2);
        assert!(snapshot.contains_key("A"));
        assert!(snapshot.contains_key("C"));
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);

        let mut bytes = b"A#@@@#1###0###10\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        fs::write(engine.path(), bytes).unwrap();

        let snapshot = engine.load_all().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.malformed_lines(), 1);
    }

    #[test]
    fn test_rewrite_without() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);

        engine.append(&record("A", "1", 0)).unwrap();
        engine.append(&record("B", "2", 5)).unwrap();
        engine.append(&record("C", "3", 0)).unwrap();

        assert!(engine.rewrite_without("B").unwrap());

        let snapshot = engine.load_all().unwrap();
        let keys: Vec<_> = snapshot.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["A", "C"]);

        // Absent key leaves the survivors untouched
        assert!(!engine.rewrite_without("missing").unwrap());
        assert_eq!(engine.load_all().unwrap().len(), 2);
    }

    #[test]
    fn test_rewrite_preserves_ttl_and_created_at() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);

        let keep = Record {
            key: "keep".into(),
            value: "{}".into(),
            ttl_seconds: 60,
            created_at: 1_234,
        };
        engine.append(&keep).unwrap();
        engine.append(&record("drop", "{}", 0)).unwrap();

        engine.rewrite_without("drop").unwrap();
        assert_eq!(engine.load_all().unwrap().get("keep"), Some(&keep));
    }

    #[test]
    fn test_operations_fail_while_locked_elsewhere() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        engine.append(&record("A", "1", 0)).unwrap();

        let _held = FileGuard::acquire(engine.path()).unwrap();

        assert!(matches!(engine.load_all(), Err(StorageError::LockUnavailable(_))));
        assert!(matches!(
            engine.append(&record("B", "2", 0)),
            Err(StorageError::LockUnavailable(_))
        ));
        assert!(matches!(
            engine.rewrite_without("A"),
            Err(StorageError::LockUnavailable(_))
        ));
    }

    #[test]
    fn test_lock_released_after_each_operation() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);

        engine.append(&record("A", "1", 0)).unwrap();
        engine.load_all().unwrap();
        engine.rewrite_without("A").unwrap();

        assert!(FileGuard::acquire(engine.path()).is_ok());
    }

    #[test]
    fn test_oversized_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        engine.append(&record("A", "1", 0)).unwrap();

        // Sparse file, no real disk usage
        let file = OpenOptions::new().write(true).open(engine.path()).unwrap();
        file.set_len(MAX_FILE_SIZE + 1).unwrap();

        assert!(matches!(
            engine.load_all(),
            Err(StorageError::FileTooLarge { size, limit }) if size == MAX_FILE_SIZE + 1 && limit == MAX_FILE_SIZE
        ));
        assert!(matches!(
            engine.append(&record("B", "2", 0)),
            Err(StorageError::FileTooLarge { .. })
        ));
        assert!(matches!(
            engine.rewrite_without("A"),
            Err(StorageError::FileTooLarge { .. })
        ));

        // Nothing was appended or rewritten
        assert_eq!(fs::metadata(engine.path()).unwrap().len(), MAX_FILE_SIZE + 1);
    }

    #[test]
    fn test_append_past_limit_is_rejected() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);

        let file = OpenOptions::new().write(true).open(engine.path()).unwrap();
        file.set_len(MAX_FILE_SIZE - 4).unwrap();

        assert!(matches!(
            engine.append(&record("A", "1", 0)),
            Err(StorageError::FileTooLarge { .. })
        ));
        assert_eq!(fs::metadata(engine.path()).unwrap().len(), MAX_FILE_SIZE - 4);
    }

    #[cfg(unix)]
    #[test]
    fn test_rewrite_keeps_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        engine.append(&record("A", "1", 0)).unwrap();
        engine.append(&record("B", "2", 0)).unwrap();

        fs::set_permissions(engine.path(), fs::Permissions::from_mode(0o644)).unwrap();

        engine.rewrite_without("A").unwrap();

        let mode = fs::metadata(engine.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
        assert_eq!(engine.load_all().unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_remove_keeps_index_consistent() {
        let mut snapshot = Snapshot::default();
        snapshot.insert(record("A", "1", 0));
        snapshot.insert(record("B", "2", 0));
        snapshot.insert(record("C", "3", 0));

        assert_eq!(snapshot.remove("A").unwrap().value, "1");
        assert!(snapshot.remove("A").is_none());
        assert_eq!(snapshot.get("C").unwrap().value, "3");

        let values = snapshot.into_values();
        assert_eq!(values.len(), 2);
        assert_eq!(values["B"], "2");
    }
}
