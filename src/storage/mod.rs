//! Storage Engine Module
//!
//! This module provides the persistence layer for DataStore Lite: the record
//! codec, the advisory file guard and the file-backed storage engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │        load_all()   append()   rewrite_without()            │
//! └──────────────┬─────────────────────────┬────────────────────┘
//!                │                         │
//!                ▼                         ▼
//!      ┌──────────────────┐      ┌──────────────────┐
//!      │    FileGuard     │      │   Record codec   │
//!      │ (advisory flock) │      │ key#@@@#v###t###c│
//!      └──────────────────┘      └──────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use datastore_lite::storage::{Record, StorageEngine};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let engine = StorageEngine::open(dir.path().join("store.txt"), false).unwrap();
//!
//! engine.append(&Record::new("A", r#"{"x":1}"#, 0)).unwrap();
//! assert!(engine.load_all().unwrap().contains_key("A"));
//! ```

pub mod engine;
pub mod guard;
pub mod record;

// Re-export commonly used types
pub use engine::{Snapshot, StorageEngine};
pub use guard::FileGuard;
pub use record::{now_millis, Record, FIELD_DELIMITER, KEY_DELIMITER};
