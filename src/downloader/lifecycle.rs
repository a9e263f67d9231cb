//! Shutdown coordination.

use std::sync::atomic::Ordering;

use crate::error::Result;
use crate::types::Event;

use super::DownloadManager;

impl DownloadManager {
    /// Gracefully shut down the manager
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new tasks
    /// 2. Cancels every task lifetime, which aborts running attempts
    /// 3. Waits for supervisors and attempts to exit, bounded by `shutdown_timeout`
    ///
    /// Tasks stay listed afterwards; interrupted ones show as Cancelled.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new downloads");

        self.shutdown.cancel();
        self.tracker.close();

        let timeout = self.config.download.shutdown_timeout;
        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => tracing::info!("All supervisors stopped"),
            Err(_) => tracing::warn!(
                remaining = self.tracker.len(),
                "Timeout waiting for supervisors to stop, proceeding with shutdown"
            ),
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Number of supervisors and attempts still alive
    pub fn active_supervisors(&self) -> usize {
        self.tracker.len()
    }

    /// Whether new tasks are still accepted
    pub fn is_accepting(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }
}
