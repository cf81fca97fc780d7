//! Shutdown coordination.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

/// Shared shutdown state.
///
/// Readiness checks consult [`is_shutting_down`](Self::is_shutting_down);
/// the server and background tasks wait on [`wait_for_signal`](Self::wait_for_signal).
#[derive(Clone)]
pub struct ShutdownCoordinator {
    sender: broadcast::Sender<()>,
    initiated: Arc<AtomicBool>,
    /// Upper bound for draining in-flight requests.
    drain_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(drain_timeout: Duration) -> Self {
        let (sender, _) = broadcast::channel(1);

        Self {
            sender,
            initiated: Arc::new(AtomicBool::new(false)),
            drain_timeout,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.initiated.load(Ordering::SeqCst)
    }

    /// Initiate shutdown. Later calls are no-ops.
    pub fn initiate(&self) {
        if self.initiated.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Initiating graceful shutdown");
        let _ = self.sender.send(());
    }

    /// Resolve once shutdown has been initiated, including before this call.
    pub async fn wait_for_signal(&self) {
        let mut rx = self.subscribe();
        if self.is_shutting_down() {
            return;
        }
        let _ = rx.recv().await;
    }

    /// Mark the end of the drain.
    pub fn complete(&self) {
        info!("Shutdown complete");
    }

    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}
