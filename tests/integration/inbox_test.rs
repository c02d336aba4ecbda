//! Notification intake, inbox status lifecycle and media downloads.

use beacon_core::events::CoreEvent;
use beacon_entity::inbox::{InboxFilter, InboxStatus};
use serde_json::{Value, json};

use crate::helpers::{Backend, TestBeacon};

fn notification(trid: &str, published_at: &str) -> Value {
    json!({
        "aps": { "alert": { "title": "hi" } },
        "beacon": {
            "trid": trid,
            "published_at": published_at,
            "title": format!("Message {trid}"),
            "body": "body",
            "deeplink": format!("app://messages/{trid}"),
            "media": { "url": format!("https://cdn.example.com/{trid}.png"), "kind": "image" },
            "carousel": [
                { "title": "one", "media": { "url": "https://cdn.example.com/c0.png", "kind": "image" } },
                { "title": "two", "media": { "url": "https://cdn.example.com/c1.png", "kind": "image" } }
            ]
        }
    })
}

#[tokio::test]
async fn test_received_messages_list_newest_first() {
    let t = TestBeacon::new().await;
    let notifications = t.beacon.notifications();
    notifications
        .receive(&notification("old", "2026-01-01T00:00:00Z"))
        .await
        .unwrap();
    notifications
        .receive(&notification("new", "2026-02-01T00:00:00Z"))
        .await
        .unwrap();
    // Redelivery is idempotent.
    notifications
        .receive(&notification("old", "2026-01-01T00:00:00Z"))
        .await
        .unwrap();

    let listed: Vec<String> = t
        .beacon
        .inbox()
        .query(InboxFilter::All)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.record.trid)
        .collect();
    assert_eq!(listed, vec!["new", "old"]);
    assert_eq!(t.beacon.inbox().unread_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_status_lifecycle_and_filters() {
    let t = TestBeacon::new().await;
    let notifications = t.beacon.notifications();
    for trid in ["a", "b", "c"] {
        notifications
            .receive(&notification(trid, "2026-03-01T00:00:00Z"))
            .await
            .unwrap();
    }

    notifications.open("a").await.unwrap();
    // Viewing after reading keeps Read.
    let a = notifications.mark_viewed("a").await.unwrap();
    assert_eq!(a.status, Some(InboxStatus::Read));
    notifications.dismiss("b").await.unwrap();

    let inbox = t.beacon.inbox();
    let trids = |messages: Vec<beacon_entity::inbox::InboxMessage>| -> Vec<String> {
        messages.into_iter().map(|m| m.record.trid).collect()
    };
    assert_eq!(trids(inbox.query(InboxFilter::ReadOnly).await.unwrap()), vec!["a"]);
    assert_eq!(trids(inbox.query(InboxFilter::UnreadOnly).await.unwrap()), vec!["c"]);
    assert_eq!(inbox.query(InboxFilter::InboxOnly).await.unwrap().len(), 2);
    assert_eq!(inbox.query(InboxFilter::All).await.unwrap().len(), 3);
    assert_eq!(inbox.unread_count().await.unwrap(), 1);

    // Deleted is terminal, also for redelivery.
    assert!(inbox.set_status("b", InboxStatus::Read).await.is_err());
    assert!(
        notifications
            .receive(&notification("b", "2026-03-01T00:00:00Z"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_open_publishes_deeplink_and_tracks_click() {
    let t = TestBeacon::new().await;
    let mut bus = t.beacon.subscribe();
    t.beacon
        .notifications()
        .receive(&notification("m1", "2026-03-01T00:00:00Z"))
        .await
        .unwrap();
    t.beacon.notifications().open("m1").await.unwrap();

    let mut deeplink = None;
    while let Ok(event) = bus.try_recv() {
        if let CoreEvent::DeeplinkReceived { url, .. } = event {
            deeplink = Some(url);
        }
    }
    assert_eq!(deeplink.as_deref(), Some("app://messages/m1"));

    t.beacon.flush().await.unwrap();
    assert_eq!(
        t.transport.sent_names(),
        vec![
            "PUSH_NOTIFICATION_DELIVERED",
            "INBOX_MESSAGE_DELIVERED",
            "INBOX_MESSAGE_CLICKED"
        ]
    );
    assert_eq!(t.transport.sent()[2].payload["trid"], json!("m1"));
}

#[tokio::test]
async fn test_media_downloads_fill_every_slot() {
    let t = TestBeacon::new().await;
    t.beacon
        .notifications()
        .receive(&notification("m1", "2026-03-01T00:00:00Z"))
        .await
        .unwrap();

    let handles = t.beacon.media().start_all("m1").await.unwrap();
    assert_eq!(handles.len(), 3);
    for handle in handles {
        handle.await.unwrap();
    }

    let message = t.beacon.inbox().get("m1").await.unwrap().unwrap();
    assert!(message.media_download_in_progress.is_empty());
    let payload = message.record.payload;
    let main = payload.media.unwrap().local_path.unwrap();
    assert_eq!(
        tokio::fs::read_to_string(&main).await.unwrap(),
        "https://cdn.example.com/m1.png"
    );
    for card in &payload.carousel {
        assert!(card.media.as_ref().unwrap().local_path.is_some());
    }

    // Paths are persisted, not only held in memory.
    let t = t.reopen().await;
    let reloaded = t.beacon.inbox().get("m1").await.unwrap().unwrap();
    assert!(reloaded.record.payload.carousel[1]
        .media
        .as_ref()
        .unwrap()
        .local_path
        .is_some());
    // Nothing left to fetch.
    assert!(t.beacon.media().start_all("m1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_media_download_clears_progress() {
    let t = TestBeacon::with(Backend::Accept, true, |_| {}).await;
    let mut bus = t.beacon.subscribe();
    t.beacon
        .notifications()
        .receive(&notification("m1", "2026-03-01T00:00:00Z"))
        .await
        .unwrap();

    for handle in t.beacon.media().start_all("m1").await.unwrap() {
        handle.await.unwrap();
    }

    let message = t.beacon.inbox().get("m1").await.unwrap().unwrap();
    assert!(message.media_download_in_progress.is_empty());
    assert_eq!(message.record.payload.media.unwrap().local_path, None);

    let mut failures = 0;
    while let Ok(event) = bus.try_recv() {
        if matches!(event, CoreEvent::MediaDownloadFailed { .. }) {
            failures += 1;
        }
    }
    assert_eq!(failures, 3);
}
