//! Application-facing tracking calls.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use beacon_core::error::AppError;
use beacon_core::result::AppResult;
use beacon_database::repositories::{PreferenceChange, PreferenceRepository};
use beacon_entity::event::{EventCode, EventName, EventPayload, EventRecord, EventType, NewEvent};
use beacon_entity::identity::keys;

use crate::identity::{IdentityManager, WritePolicy};

/// Tracking facade.
///
/// Every call either returns a validation error synchronously or records
/// the event; it never waits on the network. A call suppressed by the
/// tracking opt-out returns `Ok(None)`.
#[derive(Debug)]
pub struct Tracker {
    identity: Arc<IdentityManager>,
    prefs: PreferenceRepository,
    app_version: Option<String>,
}

impl Tracker {
    /// Creates a new tracker for an app running `app_version`.
    pub fn new(
        identity: Arc<IdentityManager>,
        prefs: PreferenceRepository,
        app_version: Option<String>,
    ) -> Self {
        Self {
            identity,
            prefs,
            app_version,
        }
    }

    /// Track an event of any type.
    pub async fn track(
        &self,
        event_type: EventType,
        event_name: EventName,
        payload: EventPayload,
    ) -> AppResult<Option<EventRecord>> {
        self.identity
            .enqueue_if_permitted(NewEvent {
                event_type,
                event_name,
                payload,
                user_identity: None,
            })
            .await
    }

    /// Track a catalog event under its own type.
    pub async fn track_catalog(
        &self,
        code: EventCode,
        payload: EventPayload,
    ) -> AppResult<Option<EventRecord>> {
        self.identity
            .enqueue_if_permitted(NewEvent::catalog(code, payload))
            .await
    }

    /// Track an application-defined event.
    pub async fn track_event(
        &self,
        name: &str,
        payload: EventPayload,
    ) -> AppResult<Option<EventRecord>> {
        self.identity
            .enqueue_if_permitted(NewEvent::custom(name, payload))
            .await
    }

    /// Send user profile attributes.
    pub async fn update_user_profile(&self, payload: EventPayload) -> AppResult<Option<EventRecord>> {
        if payload.is_empty() {
            return Err(AppError::validation("user profile update must not be empty"));
        }
        self.track_catalog(EventCode::UserProfilePush, payload).await
    }

    /// Track a fresh install and remember the running version.
    pub async fn track_app_install(&self) -> AppResult<Option<EventRecord>> {
        self.track_version_change(EventCode::AppInstalled).await
    }

    /// Track an update and remember the running version.
    pub async fn track_app_update(&self) -> AppResult<Option<EventRecord>> {
        self.track_version_change(EventCode::AppUpdated).await
    }

    /// Decide between install and update from the persisted app version.
    ///
    /// No stored version tracks APP_INSTALLED, a different one tracks
    /// APP_UPDATED, and the same one tracks nothing.
    pub async fn track_app_install_update_automatically(&self) -> AppResult<Option<EventRecord>> {
        let Some(current) = self.app_version.as_deref() else {
            warn!("No app version configured; install/update tracking skipped");
            return Ok(None);
        };

        match self.prefs.get(keys::APP_VERSION).await? {
            None => self.track_app_install().await,
            Some(stored) if stored != current => {
                debug!(from = %stored, to = %current, "App version changed");
                self.track_app_update().await
            }
            Some(_) => Ok(None),
        }
    }

    /// Track FIRST_APP_LAUNCHED on the very first launch, APP_LAUNCHED after.
    pub async fn track_app_launch(&self) -> AppResult<Option<EventRecord>> {
        let first = self.prefs.get(keys::FIRST_LAUNCH_TRACKED).await?.is_none();
        let code = if first {
            EventCode::FirstAppLaunched
        } else {
            EventCode::AppLaunched
        };
        let marker = [PreferenceChange::Set(keys::FIRST_LAUNCH_TRACKED, "true")];
        let changes: &[PreferenceChange<'_>] = if first { &marker } else { &[] };
        self.identity
            .record_with_preferences(code, self.version_payload(), changes, WritePolicy::WithEvent)
            .await
    }

    async fn track_version_change(&self, code: EventCode) -> AppResult<Option<EventRecord>> {
        let changes: Vec<PreferenceChange<'_>> = self
            .app_version
            .as_deref()
            .map(|version| PreferenceChange::Set(keys::APP_VERSION, version))
            .into_iter()
            .collect();
        self.identity
            .record_with_preferences(code, self.version_payload(), &changes, WritePolicy::Always)
            .await
    }

    fn version_payload(&self) -> EventPayload {
        self.app_version
            .iter()
            .map(|version| ("app_version".to_string(), json!(version)))
            .collect()
    }
}
