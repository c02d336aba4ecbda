//! Local HTTP server and record fixtures for transport tests.

use axum::Router;
use chrono::Utc;
use tokio::net::TcpListener;

use beacon_core::types::EventId;
use beacon_entity::event::{EventName, EventPayload, EventRecord, EventStatus, EventType};

/// Serve `app` on an ephemeral port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// An in-progress custom event record.
pub fn record(name: &str) -> EventRecord {
    let now = Utc::now();
    EventRecord {
        id: EventId::new(),
        event_type: EventType::Custom,
        event_name: EventName::custom(name),
        status: EventStatus::InProgress,
        payload: EventPayload::new(),
        user_identity: Some("user-1".to_string()),
        attempts: 1,
        next_attempt_at: None,
        last_error: None,
        created_at: now,
        updated_at: now,
    }
}
