//! Dispatch coordinator: drains the event queue to the transport.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use beacon_core::config::DispatchConfig;
use beacon_core::error::ErrorKind;
use beacon_core::events::{CoreEvent, EventBus};
use beacon_core::result::AppResult;
use beacon_entity::event::{EventRecord, EventStatus, RetryMetadata};
use beacon_service::EventStore;

use crate::backoff::BackoffPolicy;
use crate::transport::{DeliveryOutcome, EventTransport};

/// Counts from one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Records claimed and handed to the transport.
    pub claimed: usize,
    /// Records the backend accepted.
    pub sent: usize,
    /// Records that failed and will be retried.
    pub failed: usize,
    /// Records dropped: rejected, or out of attempts.
    pub dropped: usize,
}

impl FlushReport {
    /// Whether the flush found nothing to send.
    pub fn is_empty(&self) -> bool {
        self.claimed == 0
    }
}

/// Drains the event queue in batches.
///
/// A flush claims its batch through compare-and-set status changes
/// (Pending -> InProgress), so concurrent flushes never send a record
/// twice. No lock is held while the transport call is in flight.
#[derive(Debug)]
pub struct DispatchCoordinator {
    events: Arc<EventStore>,
    transport: Arc<dyn EventTransport>,
    backoff: Arc<dyn BackoffPolicy>,
    bus: EventBus,
    config: DispatchConfig,
}

impl DispatchCoordinator {
    /// Creates a new coordinator.
    pub fn new(
        events: Arc<EventStore>,
        transport: Arc<dyn EventTransport>,
        backoff: Arc<dyn BackoffPolicy>,
        bus: EventBus,
        config: DispatchConfig,
    ) -> Self {
        Self {
            events,
            transport,
            backoff,
            bus,
            config,
        }
    }

    /// Batch size used per flush.
    pub fn batch_size(&self) -> u32 {
        self.config.batch_size
    }

    /// Send one batch and record the outcome of every record in it.
    ///
    /// Transport failures never surface here: they become retries.
    /// Errors are local persistence failures only.
    pub async fn flush(&self) -> AppResult<FlushReport> {
        let mut report = FlushReport::default();

        let batch = self.events.pending_batch(self.config.batch_size).await?;
        if batch.is_empty() {
            return Ok(report);
        }

        let mut claimed = Vec::with_capacity(batch.len());
        for record in batch {
            match self.claim(record).await {
                Ok(Some(record)) => claimed.push(record),
                Ok(None) => {}
                Err(e) => {
                    self.release(&claimed, "batch claim failed").await;
                    return Err(e);
                }
            }
        }
        if claimed.is_empty() {
            return Ok(report);
        }
        report.claimed = claimed.len();
        debug!(count = claimed.len(), "Dispatching batch");

        let outcomes = match self.transport.send(&claimed).await {
            Ok(outcomes) if outcomes.len() == claimed.len() => outcomes,
            Ok(outcomes) => {
                warn!(
                    expected = claimed.len(),
                    received = outcomes.len(),
                    "Transport returned a mismatched outcome list; retrying batch"
                );
                let reason = format!(
                    "transport returned {} outcomes for {} records",
                    outcomes.len(),
                    claimed.len()
                );
                vec![DeliveryOutcome::Retryable(reason); claimed.len()]
            }
            Err(e) => {
                warn!(error = %e, count = claimed.len(), "Batch send failed");
                vec![DeliveryOutcome::Retryable(e.to_string()); claimed.len()]
            }
        };

        let now = Utc::now();
        let mut unsettled = Vec::new();
        for (record, outcome) in claimed.into_iter().zip(outcomes) {
            if let Err(e) = self.settle(&record, outcome, now, &mut report).await {
                error!(event_id = %record.id, error = %e, "Failed to record dispatch outcome");
                unsettled.push(record);
            }
        }
        self.release(&unsettled, "dispatch outcome was not recorded").await;

        if report.sent + report.failed + report.dropped > 0 {
            info!(
                sent = report.sent,
                failed = report.failed,
                dropped = report.dropped,
                "Flush complete"
            );
        }
        Ok(report)
    }

    /// Claim a record for this flush; `None` if another flush got it first.
    async fn claim(&self, record: EventRecord) -> AppResult<Option<EventRecord>> {
        let result = async {
            if record.status == EventStatus::Failed {
                self.events.mark_status(record.id, EventStatus::Pending).await?;
            }
            self.events.mark_status(record.id, EventStatus::InProgress).await
        }
        .await;

        match result {
            Ok(claimed) => Ok(Some(claimed)),
            Err(e) if e.is(ErrorKind::InvalidTransition) || e.is(ErrorKind::NotFound) => {
                debug!(event_id = %record.id, "Record claimed elsewhere; skipping");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn settle(
        &self,
        record: &EventRecord,
        outcome: DeliveryOutcome,
        now: DateTime<Utc>,
        report: &mut FlushReport,
    ) -> AppResult<()> {
        match outcome {
            DeliveryOutcome::Delivered => {
                self.events.mark_status(record.id, EventStatus::Success).await?;
                if !self.config.retain_delivered {
                    self.events.remove(record.id).await?;
                }
                report.sent += 1;
            }
            DeliveryOutcome::Retryable(reason) if record.attempts >= self.config.max_attempts => {
                warn!(
                    event_id = %record.id,
                    attempts = record.attempts,
                    reason = %reason,
                    "Retry budget exhausted; dropping event"
                );
                self.drop_record(record, reason).await?;
                report.dropped += 1;
            }
            DeliveryOutcome::Retryable(reason) => {
                let delay = self.backoff.delay(record.attempts);
                let next_attempt_at = chrono::Duration::from_std(delay)
                    .ok()
                    .and_then(|delay| now.checked_add_signed(delay))
                    .unwrap_or(now);
                debug!(
                    event_id = %record.id,
                    attempts = record.attempts,
                    retry_at = %next_attempt_at,
                    "Event will be retried"
                );
                self.events
                    .transition(
                        record.id,
                        EventStatus::Failed,
                        RetryMetadata {
                            attempts: record.attempts,
                            next_attempt_at: Some(next_attempt_at),
                            last_error: Some(reason),
                        },
                    )
                    .await?;
                report.failed += 1;
            }
            DeliveryOutcome::Rejected(reason) => {
                warn!(event_id = %record.id, reason = %reason, "Backend rejected event");
                self.drop_record(record, reason).await?;
                report.dropped += 1;
            }
        }
        Ok(())
    }

    /// Hand claimed records back to the retry path, due immediately.
    ///
    /// Records already settled (Success) are left alone. A release that
    /// fails is logged; `recover_in_flight` picks those up on next start.
    async fn release(&self, records: &[EventRecord], reason: &str) {
        for record in records {
            let retry = RetryMetadata {
                attempts: record.attempts,
                next_attempt_at: None,
                last_error: Some(reason.to_string()),
            };
            match self
                .events
                .transition(record.id, EventStatus::Failed, retry)
                .await
            {
                Ok(_) => debug!(event_id = %record.id, reason, "Released claimed event"),
                Err(e) if e.is(ErrorKind::InvalidTransition) || e.is(ErrorKind::NotFound) => {}
                Err(e) => {
                    error!(event_id = %record.id, error = %e, "Failed to release claimed event")
                }
            }
        }
    }

    async fn drop_record(&self, record: &EventRecord, reason: String) -> AppResult<()> {
        self.events.remove(record.id).await?;
        self.bus.publish(CoreEvent::DispatchFailed {
            event_id: record.id.into_uuid(),
            event_name: record.event_name.to_string(),
            attempts: record.attempts,
            reason,
        });
        Ok(())
    }

    /// Move records left InProgress by a previous process to Failed so
    /// they re-enter the retry path. Returns how many were moved.
    pub async fn recover_in_flight(&self) -> AppResult<usize> {
        let stranded = self.events.in_flight().await?;
        let mut recovered = 0;
        for record in stranded {
            let retry = RetryMetadata {
                attempts: record.attempts,
                next_attempt_at: None,
                last_error: Some("interrupted before the send completed".to_string()),
            };
            match self
                .events
                .transition(record.id, EventStatus::Failed, retry)
                .await
            {
                Ok(_) => recovered += 1,
                Err(e) if e.is(ErrorKind::InvalidTransition) => {}
                Err(e) => return Err(e),
            }
        }
        if recovered > 0 {
            info!(recovered, "Recovered in-flight events");
        }
        Ok(recovered)
    }
}
