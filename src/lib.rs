//! # DataStore Lite - An Embedded Single-File JSON Key-Value Store
//!
//! DataStore Lite stores JSON documents under short text keys in one
//! append-oriented flat file, for a single host process with many concurrent
//! callers. Records may carry a time-to-live; those are also kept in a faster
//! in-memory cache that a background task sweeps.
//!
//! ## Features
//!
//! - **Single File**: One line per record, human-readable, created on first use
//! - **TTL Cache**: Records with a TTL are served from memory until they expire
//! - **Active + Lazy Expiry**: A background sweeper evicts expired entries,
//!   and reads never see an expired cache entry
//! - **Advisory Locking**: Best-effort detection of other processes using the
//!   same file
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                             DataStore                                   │
//! │                 create()      read()      delete()                      │
//! │                     │           │            │                          │
//! │          ┌──────────┴───┐       │            │                          │
//! │          │  Validation  │       │            │                          │
//! │          └──────────────┘       ▼            ▼                          │
//! │  ┌────────────────────────────────┐   ┌─────────────────────────────┐   │
//! │  │          TtlCache              │   │       StorageEngine         │   │
//! │  │  ┌────────┐ ┌────────┐ ┌─────┐ │   │  FileGuard + Record codec   │   │
//! │  │  │Shard 0 │ │Shard 1 │ │...N │ │   │             │               │   │
//! │  │  └────────┘ └────────┘ └─────┘ │   │             ▼               │   │
//! │  └────────────────▲───────────────┘   │     DataStoreLite.txt       │   │
//! │                   │                   └─────────────────────────────┘   │
//! │  ┌────────────────┴───────────────┐                                     │
//! │  │         ExpirySweeper          │                                     │
//! │  │    (Background Tokio Task)     │                                     │
//! │  └────────────────────────────────┘                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use datastore_lite::{Config, DataStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let dir = tempfile::tempdir()?;
//!
//!     // Opening the store also starts its expiry sweeper
//!     let store = DataStore::open(Config::new(dir.path().join("store.txt")))?;
//!
//!     store.create("user:1", &json!({"name": "Ariz"}))?;
//!     store.create_with_ttl("session:1", &json!({"token": "abc123"}), 60)?;
//!
//!     assert_eq!(store.read("user:1")?, json!({"name": "Ariz"}));
//!
//!     store.delete("user:1")?;
//!     Ok(())
//! }
//! ```
//!
//! ## On-Disk Format
//!
//! ```text
//! <key>#@@@#<json>###<ttl seconds>###<created at, unix millis>
//! ```
//!
//! ## Module Overview
//!
//! - [`store`]: The `create` / `read` / `delete` façade
//! - [`storage`]: Record codec, file guard and file-backed engine
//! - [`cache`]: TTL cache and background expiry sweeper
//! - [`validation`]: Key and document size limits
//! - [`config`]: Store configuration
//! - [`error`]: Error types
//!
//! ## Limits
//!
//! Every `create`, every cache-missing `read` and every `delete` scans the
//! whole file, and `delete` rewrites it. That is fine up to the 1 GiB file
//! cap but is a scalability ceiling.

pub mod cache;
pub mod config;
pub mod error;
pub mod storage;
pub mod store;
pub mod validation;

// Re-export commonly used types for convenience
pub use cache::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper, TtlCache};
pub use config::Config;
pub use error::{StorageError, StoreError, StoreResult};
pub use storage::{Record, StorageEngine};
pub use store::{DataStore, StoreStats};
pub use validation::{MAX_DOCUMENT_SIZE, MAX_FILE_SIZE, MAX_KEY_LENGTH};

/// Version of DataStore Lite
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
