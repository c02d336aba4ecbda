//! Network boundary for event dispatch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use beacon_core::result::AppResult;
use beacon_entity::event::EventRecord;

/// Backend verdict for one record of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Accepted.
    Delivered,
    /// Not accepted this time; send again after backoff.
    Retryable(String),
    /// Refused for good; the record is dropped.
    Rejected(String),
}

/// Sends batches of events to the backend.
///
/// Timeouts belong to the implementation. An `Err` means nothing is known
/// about any record of the batch and all of them are retried.
#[async_trait]
pub trait EventTransport: Send + Sync + std::fmt::Debug {
    /// Send `batch`, returning one outcome per record in batch order.
    async fn send(&self, batch: &[EventRecord]) -> AppResult<Vec<DeliveryOutcome>>;
}
