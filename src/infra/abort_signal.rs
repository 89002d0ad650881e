//! Cooperative shutdown for the probe loop.
//!
//! An [`AbortHandle`] is tripped once (by Ctrl-C or by a caller) and observed
//! by the driver between probes and while it sleeps, so a shutdown never
//! interrupts an `execute` half way through a rotation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::info;

/// A cooperative abort handle. Clone-cheap.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    aborted: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal all waiters. Idempotent.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Resolve once `abort()` has been called (immediately if it already was).
    pub async fn wait_for_abort(&self) {
        loop {
            // Register before checking the flag so an abort in between is not lost.
            let notified = self.notify.notified();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep for `duration` unless aborted first. Returns `false` if aborted.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_aborted(),
            _ = self.wait_for_abort() => false,
        }
    }

    /// Trip this handle when the process receives Ctrl-C.
    pub fn abort_on_ctrl_c(&self) {
        let handle = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, stopping after the current probe");
                handle.abort();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn abort_wakes_waiters() {
        let handle = AbortHandle::new();
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move {
                handle.wait_for_abort().await;
                true
            })
        };

        tokio::task::yield_now().await;
        handle.abort();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn sleep_completes_when_not_aborted() {
        let handle = AbortHandle::new();
        assert!(handle.sleep(Duration::from_millis(5)).await);
    }

    #[tokio::test]
    async fn sleep_is_cut_short_by_abort() {
        let handle = AbortHandle::new();
        handle.abort();
        let started = std::time::Instant::now();
        assert!(!handle.sleep(Duration::from_secs(3600)).await);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn not_aborted_initially() {
        let handle = AbortHandle::new();
        assert!(!handle.is_aborted());
        handle.abort();
        assert!(handle.is_aborted());
    }
}
