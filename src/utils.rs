//! Shutdown signalling shared between the scan loop and the CLI.

use tokio::sync::watch;
use tracing::info;

/// Requests cancellation of a running scan.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Signal all handles. Idempotent.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

/// Cancellation handle checked by the scanner between items and between
/// cycles. Cloneable; all clones observe the same trigger.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    rx: watch::Receiver<bool>,
}

impl ShutdownHandle {
    /// Non-blocking check, used between items so the current item always
    /// settles to a terminal outcome before we honor the request.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until shutdown is requested.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// A handle that never fires, for tests and one-shot runs.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // Keep the sender alive forever so the channel never closes.
        std::mem::forget(tx);
        Self { rx }
    }
}

/// Create a connected trigger/handle pair.
pub fn shutdown_pair() -> (ShutdownTrigger, ShutdownHandle) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownHandle { rx })
}

/// Spawn a Ctrl-C listener and return the handle it trips.
pub fn listen_for_ctrl_c() -> ShutdownHandle {
    let (trigger, handle) = shutdown_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received, finishing current item...");
            trigger.trigger();
        }
    });
    handle
}
