//! Background processing for Beacon.
//!
//! This crate provides:
//! - The dispatch coordinator that drains the event queue to a transport
//! - A retry backoff policy for failed sends
//! - A runner that flushes on a timer or on demand
//! - A cron-driven retention sweep

pub mod backoff;
pub mod coordinator;
pub mod retention;
pub mod runner;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use backoff::{BackoffPolicy, ExponentialBackoff};
pub use coordinator::{DispatchCoordinator, FlushReport};
pub use retention::{RetentionScheduler, RetentionSweep, SweepReport};
pub use runner::{DispatchHandle, DispatchRunner};
pub use transport::{DeliveryOutcome, EventTransport};
