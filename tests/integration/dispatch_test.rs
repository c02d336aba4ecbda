//! Event queue durability, dispatch and retry behavior.

use std::sync::Arc;

use beacon_core::events::CoreEvent;
use beacon_entity::event::{EventPayload, EventStatus};
use serde_json::json;

use crate::helpers::{Backend, TestBeacon, eventually};

fn payload(value: i64) -> EventPayload {
    EventPayload::from([("value".to_string(), json!(value))])
}

#[tokio::test]
async fn test_events_are_sent_in_tracking_order() {
    let t = TestBeacon::new().await;
    for i in 0..25 {
        t.beacon
            .track_event(&format!("step_{i}"), payload(i))
            .await
            .unwrap();
    }

    // batch_size is 10
    assert_eq!(t.beacon.flush().await.unwrap().sent, 10);
    assert_eq!(t.beacon.flush().await.unwrap().sent, 10);
    assert_eq!(t.beacon.flush().await.unwrap().sent, 5);
    assert!(t.beacon.flush().await.unwrap().is_empty());

    let expected: Vec<String> = (0..25).map(|i| format!("step_{i}")).collect();
    assert_eq!(t.transport.sent_names(), expected);
    assert_eq!(t.transport.sent()[3].payload["value"], json!(3));
}

#[tokio::test]
async fn test_tracked_events_survive_restart() {
    let t = TestBeacon::with(Backend::Down, false, |_| {}).await;
    let record = t
        .beacon
        .track_event("checkout", payload(1))
        .await
        .unwrap()
        .unwrap();

    let t = t.reopen().await;
    let stored = t.beacon.events().get(record.id).await.unwrap();
    assert_eq!(stored.status, EventStatus::Pending);
    assert_eq!(stored.payload, payload(1));
}

#[tokio::test]
async fn test_outage_retries_then_delivers() {
    let t = TestBeacon::with(Backend::Down, false, |_| {}).await;
    let record = t
        .beacon
        .track_event("purchase", payload(9))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(t.beacon.flush().await.unwrap().failed, 1);
    let failed = t.beacon.events().get(record.id).await.unwrap();
    assert_eq!(failed.status, EventStatus::Failed);
    assert_eq!(failed.attempts, 1);
    assert!(failed.last_error.unwrap().contains("connection refused"));

    t.transport.set(Backend::Accept);
    assert_eq!(t.beacon.flush().await.unwrap().sent, 1);
    assert!(t.beacon.events().get(record.id).await.is_err());
    assert_eq!(t.transport.sent_names(), vec!["purchase", "purchase"]);
}

#[tokio::test]
async fn test_exhausted_retries_are_reported_not_raised() {
    let t = TestBeacon::with(Backend::Unavailable, false, |_| {}).await;
    let mut bus = t.beacon.subscribe();
    let record = t
        .beacon
        .track_event("doomed", payload(0))
        .await
        .unwrap()
        .unwrap();

    for _ in 0..3 {
        t.beacon.flush().await.unwrap();
    }
    assert!(t.beacon.events().get(record.id).await.is_err());
    match bus.recv().await.unwrap() {
        CoreEvent::DispatchFailed {
            event_id,
            attempts,
            ..
        } => {
            assert_eq!(event_id, record.id.into_uuid());
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_backoff_defers_retry() {
    let t = TestBeacon::with(Backend::Unavailable, false, |c| {
        c.dispatch.backoff_initial_ms = 60_000;
        c.dispatch.backoff_max_ms = 60_000;
    })
    .await;
    t.beacon.track_event("later", payload(0)).await.unwrap();

    assert_eq!(t.beacon.flush().await.unwrap().failed, 1);
    t.transport.set(Backend::Accept);
    assert!(t.beacon.flush().await.unwrap().is_empty());
    assert_eq!(t.transport.sent_names().len(), 1);
}

#[tokio::test]
async fn test_rejected_batch_is_dropped() {
    let t = TestBeacon::with(Backend::Reject("schema".to_string()), false, |_| {}).await;
    let mut bus = t.beacon.subscribe();
    t.beacon.track_event("bad", payload(0)).await.unwrap();

    assert_eq!(t.beacon.flush().await.unwrap().dropped, 1);
    assert!(matches!(
        bus.recv().await.unwrap(),
        CoreEvent::DispatchFailed { reason, .. } if reason == "schema"
    ));
}

#[tokio::test]
async fn test_start_recovers_interrupted_send() {
    let t = TestBeacon::with(Backend::Down, false, |_| {}).await;
    let record = t
        .beacon
        .track_event("interrupted", payload(0))
        .await
        .unwrap()
        .unwrap();
    // Simulate a process that died after claiming the record.
    t.beacon
        .events()
        .mark_status(record.id, EventStatus::InProgress)
        .await
        .unwrap();

    let t = t.reopen().await;
    t.transport.set(Backend::Accept);
    t.beacon.start().await.unwrap();

    let transport = Arc::clone(&t.transport);
    assert!(eventually(|| transport.sent_names().contains(&"interrupted".to_string())).await);
    t.beacon.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_process_events_manually_wakes_runner() {
    let t = TestBeacon::new().await;
    t.beacon.start().await.unwrap();
    let transport = Arc::clone(&t.transport);
    // Install and launch events go out on the runner's first pass.
    assert!(eventually(|| transport.sent_names().len() >= 2).await);

    t.beacon.track_event("tapped", payload(0)).await.unwrap();
    t.beacon.process_events_manually();
    assert!(eventually(|| transport.sent_names().contains(&"tapped".to_string())).await);
    t.beacon.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_retained_deliveries_are_swept() {
    let t = TestBeacon::with(Backend::Accept, false, |c| {
        c.dispatch.retain_delivered = true;
        c.retention.schedule = Some("0 0 * * * *".to_string());
        c.retention.event_max_age_hours = Some(0);
    })
    .await;
    let record = t
        .beacon
        .track_event("kept", payload(0))
        .await
        .unwrap()
        .unwrap();
    t.beacon.flush().await.unwrap();
    assert_eq!(
        t.beacon.events().get(record.id).await.unwrap().status,
        EventStatus::Success
    );

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let report = t.beacon.sweep().await.unwrap();
    assert_eq!(report.events_purged, 1);
    assert!(t.beacon.events().get(record.id).await.is_err());
}
