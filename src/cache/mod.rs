//! TTL Cache Module
//!
//! This module keeps the in-memory view of records that carry an expiry.
//! It includes a sharded, thread-safe TTL cache and a background sweeper
//! that evicts expired entries.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        TtlCache                             │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...16    │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! The cache is owned by a single [`DataStore`](crate::DataStore) and lives
//! exactly as long as it does. Nothing here is global.

pub mod expiry;
pub mod ttl;

// Re-export commonly used types
pub use expiry::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper, DEFAULT_SWEEP_INTERVAL};
pub use ttl::TtlCache;
