//! Periodic background flush of the durable tier.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::service::CacheStore;
use super::types::{CacheError, FlushOutcome};

/// Owns the task that flushes a [`CacheStore`] on an interval.
///
/// Flush failures are logged and retried on the next tick. [`shutdown`]
/// stops the loop and runs one last flush so no dirty entries are lost.
///
/// [`shutdown`]: FlushDaemon::shutdown
pub struct FlushDaemon {
    store: Arc<CacheStore>,
    handle: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl FlushDaemon {
    /// Spawns the flush loop. Must be called within a Tokio runtime.
    pub fn start(store: Arc<CacheStore>, interval: Duration) -> Self {
        let shutdown = CancellationToken::new();

        let loop_store = Arc::clone(&store);
        let loop_shutdown = shutdown.clone();
        let handle = tokio::spawn(async move {
            run_flush_loop(loop_store, interval, loop_shutdown).await;
        });

        info!(
            backend = store.backend_name(),
            interval_secs = interval.as_secs(),
            "Cache flush daemon started"
        );

        Self {
            store,
            handle: Mutex::new(Some(handle)),
            shutdown,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the loop, waits for it, then flushes once more.
    ///
    /// Calling it again only repeats the final flush.
    pub async fn shutdown(&self) -> Result<FlushOutcome, CacheError> {
        info!("Cache flush daemon shutting down");
        self.shutdown.cancel();

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        let outcome = self.store.flush().await;
        if let Ok(outcome) = &outcome {
            info!(outcome = %outcome, "Final cache flush complete");
        }
        outcome
    }
}

impl Drop for FlushDaemon {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_flush_loop(store: Arc<CacheStore>, interval: Duration, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Cache flush loop stopping");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                match store.flush().await {
                    Ok(FlushOutcome::Clean) => debug!("Cache clean, nothing to flush"),
                    Ok(FlushOutcome::Written { .. }) => {}
                    // Already logged by the store; the dirty flag stays set
                    Err(e) => warn!(error = %e, "Scheduled flush failed"),
                }
            }
        }
    }
}
