//! Push and in-app notification intake.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use beacon_core::error::{AppError, ErrorKind};
use beacon_core::events::{CoreEvent, EventBus};
use beacon_core::result::AppResult;
use beacon_entity::event::{EventCode, EventPayload};
use beacon_entity::inbox::{InboxRecord, InboxStatus, NotificationPayload};

use crate::inbox::InboxStore;
use crate::tracking::Tracker;

/// Key under which a raw notification carries Beacon data.
pub const ORIGIN_KEY: &str = "beacon";

/// The Beacon part of a raw notification.
#[derive(Debug, Clone, Deserialize)]
struct Envelope {
    trid: String,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default = "default_store_in_inbox")]
    inbox: bool,
    #[serde(flatten)]
    payload: NotificationPayload,
}

fn default_store_in_inbox() -> bool {
    true
}

/// Handles notifications delivered by the push/in-app channel and the
/// user's interactions with them.
#[derive(Debug, Clone)]
pub struct NotificationService {
    inbox: Arc<InboxStore>,
    tracker: Arc<Tracker>,
    bus: EventBus,
}

impl NotificationService {
    /// Creates a new notification service.
    pub fn new(inbox: Arc<InboxStore>, tracker: Arc<Tracker>, bus: EventBus) -> Self {
        Self {
            inbox,
            tracker,
            bus,
        }
    }

    /// Whether a raw notification originates from Beacon.
    pub fn is_beacon_notification(raw: &Value) -> bool {
        raw.get(ORIGIN_KEY)
            .and_then(|data| data.get("trid"))
            .and_then(Value::as_str)
            .is_some_and(|trid| !trid.trim().is_empty())
    }

    fn parse(raw: &Value) -> AppResult<Envelope> {
        let data = raw
            .get(ORIGIN_KEY)
            .ok_or_else(|| AppError::validation("not a Beacon notification"))?;
        let envelope: Envelope = serde_json::from_value(data.clone()).map_err(|e| {
            AppError::with_source(ErrorKind::Validation, "Malformed Beacon notification", e)
        })?;
        if envelope.trid.trim().is_empty() {
            return Err(AppError::validation("notification trid must not be empty"));
        }
        Ok(envelope)
    }

    /// Accept a delivered notification.
    ///
    /// Tracks PUSH_NOTIFICATION_DELIVERED, and for inbox notifications
    /// stores the message, tracks INBOX_MESSAGE_DELIVERED, and publishes
    /// [`CoreEvent::InboxMessageReceived`]. Redelivery of a message the
    /// user deleted is ignored.
    pub async fn receive(&self, raw: &Value) -> AppResult<Option<InboxRecord>> {
        let envelope = Self::parse(raw)?;
        let trid = envelope.trid.clone();
        self.tracker
            .track_catalog(EventCode::PushDelivered, trid_payload(&trid))
            .await?;

        if !envelope.inbox {
            debug!(trid = %trid, "Notification not stored in inbox");
            return Ok(None);
        }

        let published_at = envelope.published_at.unwrap_or_else(Utc::now);
        let record = match self.inbox.upsert(&trid, envelope.payload, published_at).await {
            Ok(record) => record,
            Err(e) if e.is(ErrorKind::InvalidState) => {
                debug!(trid = %trid, "Ignoring redelivery of deleted message");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        self.tracker
            .track_catalog(EventCode::InboxDelivered, trid_payload(&trid))
            .await?;
        self.bus.publish(CoreEvent::InboxMessageReceived {
            trid: trid.clone(),
            published_at: record.published_at,
        });
        info!(trid = %trid, "Inbox message received");
        Ok(Some(record))
    }

    /// The user saw the message in the inbox list.
    pub async fn mark_viewed(&self, trid: &str) -> AppResult<InboxRecord> {
        let before = self.current_status(trid).await?;
        let record = self.inbox.set_status(trid, InboxStatus::Viewed).await?;
        if before.is_none() {
            self.tracker
                .track_catalog(EventCode::InboxViewed, trid_payload(trid))
                .await?;
        }
        Ok(record)
    }

    /// The user opened the message: mark it Read, track the click, and
    /// publish its deeplink.
    pub async fn open(&self, trid: &str) -> AppResult<InboxRecord> {
        let record = self.inbox.set_status(trid, InboxStatus::Read).await?;
        self.tracker
            .track_catalog(EventCode::InboxClicked, trid_payload(trid))
            .await?;
        self.publish_deeplink(&record.payload);
        Ok(record)
    }

    /// The user removed the message.
    pub async fn dismiss(&self, trid: &str) -> AppResult<InboxRecord> {
        let record = self.inbox.set_status(trid, InboxStatus::Deleted).await?;
        self.tracker
            .track_catalog(EventCode::InboxDismissed, trid_payload(trid))
            .await?;
        Ok(record)
    }

    /// The user tapped a push notification. Tracks the click, marks a
    /// stored copy Read, and returns the deeplink it carried.
    pub async fn handle_push_click(&self, raw: &Value) -> AppResult<Option<String>> {
        let envelope = Self::parse(raw)?;
        self.tracker
            .track_catalog(EventCode::PushClicked, trid_payload(&envelope.trid))
            .await?;

        if let Some(existing) = self.inbox.get(&envelope.trid).await? {
            if !existing.record.is_deleted() {
                self.inbox.set_status(&envelope.trid, InboxStatus::Read).await?;
            }
        }

        self.publish_deeplink(&envelope.payload);
        Ok(envelope.payload.deeplink)
    }

    async fn current_status(&self, trid: &str) -> AppResult<Option<InboxStatus>> {
        self.inbox
            .get(trid)
            .await?
            .map(|message| message.record.status)
            .ok_or_else(|| AppError::not_found(format!("Inbox message '{trid}' not found")))
    }

    fn publish_deeplink(&self, payload: &NotificationPayload) {
        if let Some(url) = &payload.deeplink {
            self.bus.publish(CoreEvent::DeeplinkReceived {
                url: url.clone(),
                custom_payload: payload.custom_payload.clone(),
            });
        }
    }
}

fn trid_payload(trid: &str) -> EventPayload {
    EventPayload::from([("trid".to_string(), json!(trid))])
}
