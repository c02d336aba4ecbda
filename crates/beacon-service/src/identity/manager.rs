//! User identity, consent flags, and device metadata.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use beacon_core::error::{AppError, ErrorKind};
use beacon_core::result::AppResult;
use beacon_core::types::DeviceGuid;
use beacon_database::repositories::{PreferenceChange, PreferenceRepository};
use beacon_entity::event::{EventCode, EventPayload, EventRecord, NewEvent};
use beacon_entity::identity::{IdentityState, OptChannel, keys};

use crate::event::EventStore;
use crate::event::store::log_enqueued;

/// When preference changes that accompany an event are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Write the changes even if consent suppresses the event.
    Always,
    /// Write the changes only together with the event.
    WithEvent,
}

/// Identity manager.
///
/// Holds the session's [`IdentityState`], persisted in the preference set,
/// and is the single gate every tracked event passes through: while
/// tracking is opted out only opt events reach the [`EventStore`].
#[derive(Debug)]
pub struct IdentityManager {
    prefs: PreferenceRepository,
    events: Arc<EventStore>,
    state: Mutex<IdentityState>,
    device_guid: DeviceGuid,
}

impl IdentityManager {
    /// Load persisted state, creating the device GUID on first start.
    pub async fn load(prefs: PreferenceRepository, events: Arc<EventStore>) -> AppResult<Self> {
        let mut state = IdentityState {
            user_identity: prefs
                .get(keys::USER_IDENTITY)
                .await?
                .filter(|identity| !identity.is_empty()),
            ..IdentityState::default()
        };
        for channel in OptChannel::all() {
            if let Some(value) = prefs.get(channel.preference_key()).await? {
                state.set_opted(channel, parse_flag(&value));
            }
        }

        let device_guid = match prefs.get(keys::DEVICE_GUID).await? {
            Some(raw) => raw.parse::<DeviceGuid>().map_err(|e| {
                AppError::with_source(ErrorKind::Persistence, "Stored device GUID is corrupt", e)
            })?,
            None => {
                let guid = DeviceGuid::new();
                prefs.set(keys::DEVICE_GUID, &guid.to_string()).await?;
                info!(device_guid = %guid, "Generated device GUID");
                guid
            }
        };

        Ok(Self {
            prefs,
            events,
            state: Mutex::new(state),
            device_guid,
        })
    }

    /// Snapshot of the current state.
    pub async fn state(&self) -> IdentityState {
        self.state.lock().await.clone()
    }

    /// Set the identity and track USER_LOGGED_IN.
    pub async fn login(&self, identity: &str) -> AppResult<Option<EventRecord>> {
        let identity = validate_identity(identity)?;
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        next.user_identity = Some(identity.to_string());
        let record = self
            .commit(
                &next,
                &[PreferenceChange::Set(keys::USER_IDENTITY, identity)],
                EventCode::UserLoggedIn,
                EventPayload::new(),
                WritePolicy::Always,
            )
            .await?;
        *state = next;
        info!(user_identity = %identity, "User logged in");
        Ok(record)
    }

    /// Track USER_LOGGED_OUT under the current identity, then clear the
    /// identity if `clear_identity` is set.
    pub async fn logout(&self, clear_identity: bool) -> AppResult<Option<EventRecord>> {
        let mut state = self.state.lock().await;
        let clear = [PreferenceChange::Delete(keys::USER_IDENTITY)];
        let changes: &[PreferenceChange<'_>] = if clear_identity { &clear } else { &[] };
        let record = self
            .commit(
                &state,
                changes,
                EventCode::UserLoggedOut,
                EventPayload::new(),
                WritePolicy::Always,
            )
            .await?;
        if clear_identity {
            state.user_identity = None;
        }
        info!(cleared = clear_identity, "User logged out");
        Ok(record)
    }

    /// Replace the identity without tracking a login.
    pub async fn set_identity(&self, identity: &str) -> AppResult<()> {
        let identity = validate_identity(identity)?;
        let mut state = self.state.lock().await;
        self.prefs.set(keys::USER_IDENTITY, identity).await?;
        state.user_identity = Some(identity.to_string());
        Ok(())
    }

    /// Current identity.
    pub async fn identity(&self) -> Option<String> {
        self.state.lock().await.user_identity.clone()
    }

    /// Remove the identity without tracking a logout.
    pub async fn clear_identity(&self) -> AppResult<()> {
        let mut state = self.state.lock().await;
        self.prefs.delete(keys::USER_IDENTITY).await?;
        state.user_identity = None;
        Ok(())
    }

    /// Update a consent flag.
    ///
    /// The matching opt event is recorded once per actual change, before
    /// the new flag takes effect; setting a flag to its current value does
    /// nothing.
    pub async fn set_opt(&self, channel: OptChannel, opted: bool) -> AppResult<Option<EventRecord>> {
        let mut state = self.state.lock().await;
        if state.opted(channel) == opted {
            debug!(channel = %channel, opted, "Opt flag unchanged");
            return Ok(None);
        }

        let value = if opted { "true" } else { "false" };
        let record = self
            .commit(
                &state,
                &[PreferenceChange::Set(channel.preference_key(), value)],
                channel.opt_event(opted),
                EventPayload::new(),
                WritePolicy::Always,
            )
            .await?;
        state.set_opted(channel, opted);
        info!(channel = %channel, opted, "Opt flag changed");
        Ok(record)
    }

    /// Current consent flag.
    pub async fn has_opted(&self, channel: OptChannel) -> bool {
        self.state.lock().await.opted(channel)
    }

    /// Enqueue `event` under the current identity if consent permits it.
    ///
    /// Returns `None` when the event was suppressed. Opt events are
    /// rejected: they are only recorded by [`IdentityManager::set_opt`].
    pub async fn enqueue_if_permitted(&self, event: NewEvent) -> AppResult<Option<EventRecord>> {
        if event.event_name.is_opt_event() {
            return Err(AppError::validation(format!(
                "{} is recorded by changing the consent flag",
                event.event_name
            )));
        }
        let state = self.state.lock().await;
        self.enqueue_locked(&state, event).await
    }

    /// Record `code` together with `changes` to the preference set in one
    /// transaction.
    ///
    /// With [`WritePolicy::WithEvent`] nothing is written when consent
    /// suppresses the event.
    pub async fn record_with_preferences(
        &self,
        code: EventCode,
        payload: EventPayload,
        changes: &[PreferenceChange<'_>],
        policy: WritePolicy,
    ) -> AppResult<Option<EventRecord>> {
        if code.is_opt_event() {
            return Err(AppError::validation(format!(
                "{code} is recorded by changing the consent flag"
            )));
        }
        let state = self.state.lock().await;
        self.commit(&state, changes, code, payload, policy).await
    }

    /// Installation identifier.
    pub fn device_guid(&self) -> DeviceGuid {
        self.device_guid
    }

    /// Store the device push token.
    ///
    /// Tracks PUSH_NOTIFICATION_TOKEN_GENERATED for the first token and
    /// PUSH_NOTIFICATION_TOKEN_REFRESHED when it changes. Re-registering
    /// the current token does nothing.
    pub async fn register_push_token(&self, token: &str) -> AppResult<Option<EventRecord>> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::validation("push token must not be empty"));
        }

        let state = self.state.lock().await;
        let previous = self.prefs.get(keys::PUSH_TOKEN).await?;
        let code = match previous.as_deref() {
            Some(current) if current == token => return Ok(None),
            Some(_) => EventCode::PushTokenRefreshed,
            None => EventCode::PushTokenGenerated,
        };
        let record = self
            .commit(
                &state,
                &[PreferenceChange::Set(keys::PUSH_TOKEN, token)],
                code,
                payload([("token", json!(token))]),
                WritePolicy::Always,
            )
            .await?;
        info!(event = %code, "Push token stored");
        Ok(record)
    }

    /// Track a failed push registration.
    pub async fn push_token_failed(&self, reason: &str) -> AppResult<Option<EventRecord>> {
        warn!(reason, "Push token registration failed");
        let state = self.state.lock().await;
        self.record(
            &state,
            EventCode::PushTokenFailed,
            payload([("reason", json!(reason))]),
        )
        .await
    }

    /// Stored push token.
    pub async fn push_token(&self) -> AppResult<Option<String>> {
        self.prefs.get(keys::PUSH_TOKEN).await
    }

    /// The full persisted preference set.
    pub async fn stored_preferences(&self) -> AppResult<BTreeMap<String, String>> {
        Ok(self.prefs.all().await?.into_iter().collect())
    }

    async fn record(
        &self,
        state: &IdentityState,
        code: EventCode,
        payload: EventPayload,
    ) -> AppResult<Option<EventRecord>> {
        self.enqueue_locked(state, NewEvent::catalog(code, payload))
            .await
    }

    /// Write `changes` together with the `code` event in one transaction.
    ///
    /// The event is gated and attributed by `state`.
    async fn commit(
        &self,
        state: &IdentityState,
        changes: &[PreferenceChange<'_>],
        code: EventCode,
        payload: EventPayload,
        policy: WritePolicy,
    ) -> AppResult<Option<EventRecord>> {
        let event = NewEvent::catalog(code, payload);
        let record = if permits(state, &event) {
            Some(EventStore::prepare(
                event.with_identity(state.user_identity.clone()),
            )?)
        } else {
            None
        };
        if record.is_none() && policy == WritePolicy::WithEvent {
            return Ok(None);
        }
        self.prefs.write_with_event(changes, record.as_ref()).await?;
        if let Some(record) = &record {
            log_enqueued(record);
        }
        Ok(record)
    }

    async fn enqueue_locked(
        &self,
        state: &IdentityState,
        event: NewEvent,
    ) -> AppResult<Option<EventRecord>> {
        if !permits(state, &event) {
            return Ok(None);
        }
        let event = event.with_identity(state.user_identity.clone());
        self.events.enqueue(event).await.map(Some)
    }
}

/// While tracking is opted out only opt events are recorded.
fn permits(state: &IdentityState, event: &NewEvent) -> bool {
    if !state.opted_tracking && !event.event_name.is_opt_event() {
        warn!(event_name = %event.event_name, "Tracking opted out; event suppressed");
        return false;
    }
    true
}

fn validate_identity(identity: &str) -> AppResult<&str> {
    let identity = identity.trim();
    if identity.is_empty() {
        return Err(AppError::validation("user identity must not be empty"));
    }
    Ok(identity)
}

fn parse_flag(value: &str) -> bool {
    !matches!(value, "false" | "0")
}

fn payload<const N: usize>(pairs: [(&str, Value); N]) -> EventPayload {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
