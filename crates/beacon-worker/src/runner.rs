//! Dispatch runner: main loop that flushes the event queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::time;

use crate::coordinator::DispatchCoordinator;

/// Wakes a running [`DispatchRunner`] for an immediate flush.
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    wake: Arc<Notify>,
}

impl DispatchHandle {
    /// Request a flush now instead of at the next poll tick.
    pub fn process_now(&self) {
        self.wake.notify_one();
    }
}

/// Flushes the queue on a timer and on demand
#[derive(Debug)]
pub struct DispatchRunner {
    /// Coordinator performing each flush
    coordinator: Arc<DispatchCoordinator>,
    /// Interval between timer-driven flushes
    poll_interval: Duration,
    /// Wake-up signal shared with handles
    wake: Arc<Notify>,
}

impl DispatchRunner {
    /// Create a new dispatch runner
    pub fn new(coordinator: Arc<DispatchCoordinator>, poll_interval: Duration) -> Self {
        Self {
            coordinator,
            poll_interval,
            wake: Arc::new(Notify::new()),
        }
    }

    /// Handle for requesting immediate flushes
    pub fn handle(&self) -> DispatchHandle {
        DispatchHandle {
            wake: Arc::clone(&self.wake),
        }
    }

    /// Run until the cancel signal is received
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        tracing::info!(
            "Dispatch runner started with batch_size={}, poll_interval={}s",
            self.coordinator.batch_size(),
            self.poll_interval.as_secs()
        );

        loop {
            if *cancel.borrow() {
                break;
            }

            // A full batch means more work is probably waiting. Retryable
            // failures wait for the next tick so due retries cannot spin.
            let full_batch = match self.coordinator.flush().await {
                Ok(report) => {
                    report.claimed >= self.coordinator.batch_size() as usize
                        && report.failed == 0
                }
                Err(e) => {
                    tracing::error!("Dispatch flush failed: {}", e);
                    false
                }
            };
            if full_batch {
                continue;
            }

            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        tracing::info!("Dispatch runner received shutdown signal");
                        break;
                    }
                }
                _ = self.wake.notified() => {
                    tracing::debug!("Dispatch runner woken for immediate flush");
                }
                _ = time::sleep(self.poll_interval) => {}
            }
        }

        tracing::info!("Dispatch runner shut down complete");
    }
}
