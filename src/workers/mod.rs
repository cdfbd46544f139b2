//! Background Maintenance Workers
//!
//! Two periodic tasks keep the store healthy while the HTTP handlers do
//! their work:
//!
//! 1. The **flush worker** calls [`KVStore::to_disk`] on its interval,
//!    so changed shards reach their snapshot files. It is the only
//!    writer of snapshot files during normal operation.
//! 2. The **cleanup worker** calls [`KVStore::cleanup`] on its interval,
//!    reclaiming entries whose TTL has elapsed. Without it, an expired
//!    key that is never read again would sit in memory forever.
//!
//! Both loops share one `watch` shutdown channel. Flush errors are
//! logged and the loop keeps going; the server must not stop serving
//! because a disk write failed. There is no final flush on shutdown:
//! the next startup either loads the last snapshots or reinitializes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::storage::KVStore;

/// Intervals for the two maintenance loops.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Period between snapshot passes.
    pub flush_interval: Duration,

    /// Period between eviction passes.
    pub cleanup_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_millis(crate::DEFAULT_FLUSH_INTERVAL_MS),
            cleanup_interval: Duration::from_millis(crate::DEFAULT_CLEANUP_INTERVAL_MS),
        }
    }
}

/// A handle to the two running maintenance tasks.
///
/// Dropping the handle signals shutdown; [`shutdown`](Self::shutdown)
/// additionally waits for both loops to finish their in-flight pass.
#[derive(Debug)]
pub struct MaintenanceWorkers {
    /// Shared cancellation source for both loops.
    shutdown_tx: watch::Sender<bool>,
    flush: JoinHandle<()>,
    cleanup: JoinHandle<()>,
}

impl MaintenanceWorkers {
    /// Spawns the flush and cleanup loops on the current runtime.
    pub fn start(store: Arc<KVStore>, config: WorkerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let flush = tokio::spawn(flush_loop(
            Arc::clone(&store),
            config.flush_interval,
            shutdown_rx.clone(),
        ));
        let cleanup = tokio::spawn(cleanup_loop(store, config.cleanup_interval, shutdown_rx));

        info!("maintenance workers started");

        Self {
            shutdown_tx,
            flush,
            cleanup,
        }
    }

    /// Signals both loops to stop after their current pass.
    ///
    /// Called automatically when the handle is dropped.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Signals shutdown and waits for both loops to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        let _ = (&mut self.flush).await;
        let _ = (&mut self.cleanup).await;
        info!("maintenance workers stopped");
    }
}

impl Drop for MaintenanceWorkers {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Periodically flushes changed shards to disk. A failed pass is logged
/// and the next tick tries again.
async fn flush_loop(store: Arc<KVStore>, period: Duration, mut shutdown_rx: watch::Receiver<bool>) {
    let mut timer = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = timer.tick() => {
                if let Err(e) = store.to_disk() {
                    error!(error = %e, "flushing store to disk failed");
                }
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("flush worker received shutdown signal");
                    return;
                }
            }
        }
    }
}

/// Periodically evicts expired entries across all shards.
async fn cleanup_loop(
    store: Arc<KVStore>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut timer = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = timer.tick() => {
                let evicted = store.cleanup();
                if evicted > 0 {
                    debug!(evicted, remaining = store.len(), "expired entries evicted");
                }
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("cleanup worker received shutdown signal");
                    return;
                }
            }
        }
    }
}
