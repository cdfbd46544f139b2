//! # snapkv - A Sharded In-Memory Key-Value Store with Snapshots
//!
//! snapkv is a single-node, in-memory key-value store that serves a small
//! HTTP API, periodically snapshots its contents to local files, and
//! evicts expired entries in the background.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                           snapkv                              │
//! │                                                               │
//! │  ┌─────────────┐        ┌───────────────────────────────────┐ │
//! │  │ HTTP Facade │───────>│             KVStore               │ │
//! │  │   (axum)    │        │ ┌───────┐ ┌───────┐ ┌───────┐     │ │
//! │  └─────────────┘        │ │Shard 0│ │Shard 1│ │...N   │     │ │
//! │                         │ │RwLock │ │RwLock │ │shards │     │ │
//! │                         │ └───────┘ └───────┘ └───────┘     │ │
//! │                         └─────────▲──────────────▲──────────┘ │
//! │                                   │              │            │
//! │                    ┌──────────────┴───┐  ┌───────┴──────────┐ │
//! │                    │   Flush Worker   │  │  Cleanup Worker  │ │
//! │                    │ (to_disk, timer) │  │ (evict, timer)   │ │
//! │                    └────────┬─────────┘  └──────────────────┘ │
//! │                             ▼                                 │
//! │                    shard-0 shard-1 ... shard-N  (snapshots)   │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keys are routed to shards by CRC-32, each shard behind its own
//! readers-writer lock, so a read-heavy workload never serializes on a
//! global lock. Snapshot files carry an MD5 trailer that is verified on
//! reload.
//!
//! ## Quick Start
//!
//! ```
//! use snapkv::storage::KVStore;
//! use serde_json::json;
//!
//! let store = KVStore::new(5, ".snapkv");
//!
//! store.put("name", json!("snapkv"), None);
//! assert_eq!(store.get("name").unwrap(), json!("snapkv"));
//!
//! // TTL is in seconds on the public API.
//! store.put("session", json!({"user": 42}), Some(3600.0));
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: the sharded engine, snapshot codec, and error types
//! - [`workers`]: the flush and cleanup background loops
//! - [`server`]: the axum HTTP facade

pub mod server;
pub mod storage;
pub mod workers;

// Re-export commonly used types for convenience
pub use server::router;
pub use storage::{Entry, KVStore, StoreError};
pub use workers::{MaintenanceWorkers, WorkerConfig};

/// The default host snapkv binds to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// The default port snapkv listens on
pub const DEFAULT_PORT: u16 = 8000;

/// The default number of shards
pub const DEFAULT_SHARDS: usize = 5;

/// The default snapshot directory
pub const DEFAULT_DIRECTORY: &str = ".snapkv";

/// The default flush interval in milliseconds
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1000;

/// The default cleanup interval in milliseconds
pub const DEFAULT_CLEANUP_INTERVAL_MS: u64 = 500;

/// Version of snapkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
