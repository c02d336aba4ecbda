//! Event record entity model.

use std::collections::BTreeMap;

use beacon_core::types::EventId;
use beacon_core::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::kind::{EventCode, EventName, EventType};
use super::status::EventStatus;

/// Flat key/value event payload. Values are JSON scalars.
pub type EventPayload = BTreeMap<String, Value>;

/// A tracked event persisted in the outbound queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique record identifier.
    pub id: EventId,
    /// Event category.
    pub event_type: EventType,
    /// Catalog entry or custom name.
    pub event_name: EventName,
    /// Current delivery status.
    pub status: EventStatus,
    /// Event attributes.
    pub payload: EventPayload,
    /// Identity the event was tracked under, if any.
    pub user_identity: Option<String>,
    /// Number of send attempts so far.
    pub attempts: u32,
    /// Earliest time a Failed record may be retried.
    pub next_attempt_at: Option<DateTime<Utc>>,
    /// Reason of the last failed send.
    pub last_error: Option<String>,
    /// When the event was tracked.
    pub created_at: DateTime<Utc>,
    /// When the status or retry metadata last changed.
    pub updated_at: DateTime<Utc>,
}

impl EventRecord {
    /// Backend numeric identifier of the event name.
    pub fn code(&self) -> u16 {
        self.event_name.code()
    }

    /// Whether a Failed record's backoff has elapsed at `now`.
    pub fn is_retry_due(&self, now: DateTime<Utc>) -> bool {
        self.status == EventStatus::Failed && self.next_attempt_at.is_none_or(|at| at <= now)
    }
}

/// Retry metadata written together with a status change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryMetadata {
    /// New attempt count.
    pub attempts: u32,
    /// Earliest retry time.
    pub next_attempt_at: Option<DateTime<Utc>>,
    /// Failure reason.
    pub last_error: Option<String>,
}

impl RetryMetadata {
    /// Carry over the metadata of an existing record.
    pub fn of(record: &EventRecord) -> Self {
        Self {
            attempts: record.attempts,
            next_attempt_at: record.next_attempt_at,
            last_error: record.last_error.clone(),
        }
    }
}

/// Data required to enqueue a new event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Event category.
    pub event_type: EventType,
    /// Catalog entry or custom name.
    pub event_name: EventName,
    /// Event attributes.
    #[serde(default)]
    pub payload: EventPayload,
    /// Identity to attach.
    #[serde(default)]
    pub user_identity: Option<String>,
}

impl NewEvent {
    /// Build an event for a catalog entry under its own type.
    pub fn catalog(code: EventCode, payload: EventPayload) -> Self {
        Self {
            event_type: code.event_type(),
            event_name: EventName::Catalog(code),
            payload,
            user_identity: None,
        }
    }

    /// Build an application-defined event.
    pub fn custom(name: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            event_type: EventType::Custom,
            event_name: EventName::custom(name),
            payload,
            user_identity: None,
        }
    }

    /// Attach a user identity.
    pub fn with_identity(mut self, identity: Option<String>) -> Self {
        self.user_identity = identity;
        self
    }

    /// Check the type/name combination and the payload shape.
    pub fn validate(&self) -> AppResult<()> {
        match (&self.event_name, self.event_type) {
            (EventName::Custom(name), EventType::Custom) => {
                if name.trim().is_empty() {
                    return Err(AppError::validation("custom event name must not be empty"));
                }
            }
            (EventName::Custom(name), other) => {
                return Err(AppError::validation(format!(
                    "'{name}' is not a catalog event and cannot be tracked as {other}"
                )));
            }
            (EventName::Catalog(EventCode::UserCustomEvent), _) => {
                return Err(AppError::validation(
                    "USER_CUSTOM_EVENT is reserved; track custom events by name",
                ));
            }
            (EventName::Catalog(code), event_type) => {
                if code.event_type() != event_type {
                    return Err(AppError::validation(format!(
                        "{code} belongs to {}, not {event_type}",
                        code.event_type()
                    )));
                }
            }
        }

        for (key, value) in &self.payload {
            if key.is_empty() {
                return Err(AppError::validation("payload keys must not be empty"));
            }
            if value.is_array() || value.is_object() {
                return Err(AppError::validation(format!(
                    "payload value for '{key}' must be a scalar"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::error::ErrorKind;
    use serde_json::json;

    fn payload(pairs: &[(&str, Value)]) -> EventPayload {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_catalog_event_is_valid() {
        let event = NewEvent::catalog(EventCode::AppInstalled, EventPayload::new());
        assert_eq!(event.event_type, EventType::LifeCycle);
        assert!(event.validate().is_ok());
    }

    #[test]
    fn test_custom_requires_name() {
        let err = NewEvent::custom("  ", EventPayload::new())
            .validate()
            .unwrap_err();
        assert!(err.is(ErrorKind::Validation));
    }

    #[test]
    fn test_catalog_under_wrong_type_rejected() {
        let mut event = NewEvent::catalog(EventCode::UserLoggedIn, EventPayload::new());
        event.event_type = EventType::Push;
        assert!(event.validate().unwrap_err().is(ErrorKind::Validation));
    }

    #[test]
    fn test_custom_name_under_system_rejected() {
        let event = NewEvent {
            event_type: EventType::System,
            event_name: EventName::custom("my_event"),
            payload: EventPayload::new(),
            user_identity: None,
        };
        assert!(event.validate().is_err());
    }

    #[test]
    fn test_reserved_custom_code_rejected() {
        let event = NewEvent {
            event_type: EventType::Custom,
            event_name: EventName::Catalog(EventCode::UserCustomEvent),
            payload: EventPayload::new(),
            user_identity: None,
        };
        assert!(event.validate().is_err());
    }

    #[test]
    fn test_payload_must_be_flat() {
        let ok = NewEvent::custom(
            "purchase",
            payload(&[("amount", json!(9.5)), ("sku", json!("A1")), ("gift", json!(false))]),
        );
        assert!(ok.validate().is_ok());

        let nested = NewEvent::custom("purchase", payload(&[("items", json!(["a", "b"]))]));
        assert!(nested.validate().unwrap_err().is(ErrorKind::Validation));

        let empty_key = NewEvent::custom("purchase", payload(&[("", json!(1))]));
        assert!(empty_key.validate().is_err());
    }
}
