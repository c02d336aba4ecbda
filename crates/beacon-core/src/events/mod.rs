//! Notifications from the SDK core to the host application.
//!
//! These replace delegate callbacks: the core publishes a [`CoreEvent`]
//! on the [`EventBus`] and the application layer subscribes to whatever it
//! wants to react to (deeplinks, dropped events, finished downloads).

pub mod bus;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub use bus::EventBus;

/// Messages published by the SDK core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreEvent {
    /// A notification or inbox message carrying a deeplink was opened.
    DeeplinkReceived {
        /// The deeplink URL string.
        url: String,
        /// Custom key/value data attached to the message.
        custom_payload: BTreeMap<String, Value>,
    },
    /// A tracked event was dropped after exhausting its dispatch attempts
    /// or being rejected by the backend.
    DispatchFailed {
        /// The dropped event record.
        event_id: Uuid,
        /// Catalog or custom name of the event.
        event_name: String,
        /// Number of dispatch attempts made.
        attempts: u32,
        /// Last failure reason.
        reason: String,
    },
    /// A new inbox message was stored.
    InboxMessageReceived {
        /// Transaction identifier of the message.
        trid: String,
        /// Publication time of the message.
        published_at: DateTime<Utc>,
    },
    /// A media download finished and its local path was persisted.
    MediaDownloadCompleted {
        /// Transaction identifier of the message.
        trid: String,
        /// Media slot key.
        key: String,
        /// Local path of the downloaded file.
        path: String,
    },
    /// A media download failed or was cancelled.
    MediaDownloadFailed {
        /// Transaction identifier of the message.
        trid: String,
        /// Media slot key.
        key: String,
        /// Failure reason.
        reason: String,
    },
}

impl CoreEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeeplinkReceived { .. } => "deeplink_received",
            Self::DispatchFailed { .. } => "dispatch_failed",
            Self::InboxMessageReceived { .. } => "inbox_message_received",
            Self::MediaDownloadCompleted { .. } => "media_download_completed",
            Self::MediaDownloadFailed { .. } => "media_download_failed",
        }
    }
}
