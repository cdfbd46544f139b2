//! Storage Error Types
//!
//! Everything a caller of the engine can observe going wrong. The HTTP
//! facade maps `KeyNotFound` and `Expired` to 404; `UnloadableShard` is
//! fatal to the startup path; flush failures are logged by the flush
//! worker and never reach clients.

use std::io;

use thiserror::Error;

/// Errors surfaced by [`KVStore`](crate::storage::KVStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested key is not in the store.
    #[error("key {key} not found")]
    KeyNotFound {
        /// The key that was looked up.
        key: String,
    },

    /// The key exists but its TTL has elapsed. The entry stays in place
    /// until the cleanup worker removes it.
    #[error("key {key} is expired (ttl: {ttl_ms} ms, elapsed: {elapsed_ms} ms)")]
    Expired {
        /// The key that was looked up.
        key: String,
        /// The entry's milliseconds-to-live.
        ttl_ms: f64,
        /// Milliseconds since the entry was written.
        elapsed_ms: i64,
    },

    /// A snapshot file could not be turned back into a shard. Returned
    /// only while reloading a store from disk.
    #[error("shard {shard} could not be loaded: {reason}")]
    UnloadableShard {
        /// Index of the shard whose file failed to load.
        shard: usize,
        /// What went wrong, suitable for an operator's eyes.
        reason: String,
    },

    /// A shard's entry map failed to serialize during a flush.
    #[error("shard serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Writing a snapshot file failed.
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] io::Error),
}
