//! Inbox record entity model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::payload::NotificationPayload;
use super::status::InboxStatus;

/// A persisted app-inbox message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxRecord {
    /// Transaction identifier (primary key).
    pub trid: String,
    /// User-facing status; `None` until first viewed.
    pub status: Option<InboxStatus>,
    /// Campaign publish time, used for display ordering.
    pub published_at: DateTime<Utc>,
    /// Notification content.
    pub payload: NotificationPayload,
    /// When the message was first stored.
    pub created_at: DateTime<Utc>,
    /// When the message was last modified.
    pub updated_at: DateTime<Utc>,
}

impl InboxRecord {
    /// Check if the user has opened this message.
    pub fn is_read(&self) -> bool {
        self.status == Some(InboxStatus::Read)
    }

    /// Check if the message was removed.
    pub fn is_deleted(&self) -> bool {
        self.status == Some(InboxStatus::Deleted)
    }
}

/// Read-time view of a record merged with its transient download state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboxMessage {
    /// The persisted record.
    #[serde(flatten)]
    pub record: InboxRecord,
    /// Media keys with a download currently running. Only `true` entries
    /// ever appear.
    pub media_download_in_progress: BTreeMap<String, bool>,
}
