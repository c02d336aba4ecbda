//! Event types and the fixed event catalog.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

code_enum! {
    /// Category of a tracked event.
    pub enum EventType {
        /// SDK-internal system events (identity, opt flags, device data).
        System = 0 => "SYSTEM",
        /// Application-defined events with a free-form name.
        Custom = 1 => "CUSTOM",
        /// Application lifecycle events.
        LifeCycle = 2 => "LIFE_CYCLE",
        /// Push notification events.
        Push = 3 => "PUSH",
        /// In-app message events.
        InApp = 4 => "INAPP",
        /// App inbox events.
        AppInbox = 5 => "APPINBOX",
    }
}

code_enum! {
    /// The fixed event catalog with its backend numeric identifiers.
    pub enum EventCode {
        /// Code shared by every application-defined event.
        UserCustomEvent = 0 => "USER_CUSTOM_EVENT",
        DeviceDataDump = 99 => "DEVICE_DATA_DUMP_EVENT",

        AppInstalled = 20 => "APP_INSTALLED",
        AppUpdated = 81 => "APP_UPDATED",
        AppCrashed = 82 => "APP_CRASHED",
        AppReinstalled = 83 => "APP_REINSTALLED",
        FirstAppLaunched = 80 => "FIRST_APP_LAUNCHED",
        AppLaunched = 21 => "APP_LAUNCHED",

        PushTokenGenerated = 86 => "PUSH_NOTIFICATION_TOKEN_GENERATED",
        PushTokenFailed = 87 => "PUSH_NOTIFICATION_TOKEN_FAILED",
        PushTokenRefreshed = 88 => "PUSH_NOTIFICATION_TOKEN_REFRESHED",

        DeviceDetailsUpdated = 26 => "DEVICE_DETAILS_UPDATED",

        AppLocationEnabled = 89 => "APP_LOCATION_ENABLED",
        AppLocationDisabled = 90 => "APP_LOCATION_DISABLED",

        PushDelivered = 12 => "PUSH_NOTIFICATION_DELIVERED",
        PushClicked = 13 => "PUSH_NOTIFICATION_CLICKED",
        PushDismissed = 14 => "PUSH_NOTIFICATION_DISMISSED",
        PushReplied = 19 => "PUSH_NOTIFICATION_REPLIED",

        InAppViewed = 41 => "INAPP_MESSAGE_VIEWED",
        InAppClicked = 42 => "INAPP_MESSAGE_CLICKED",
        InAppClosed = 43 => "INAPP_MESSAGE_CLOSED",

        InboxDelivered = 44 => "INBOX_MESSAGE_DELIVERED",
        InboxViewed = 45 => "INBOX_MESSAGE_VIEWED",
        InboxClicked = 46 => "INBOX_MESSAGE_CLICKED",
        InboxDismissed = 47 => "INBOX_MESSAGE_DISMISSED",

        UserLoggedIn = 22 => "USER_LOGGED_IN",
        UserLoggedOut = 23 => "USER_LOGGED_OUT",

        UserEnabledPush = 84 => "USER_ENABLED_PUSH_NOTIFICATION",
        UserDisabledPush = 85 => "USER_DISABLED_PUSH_NOTIFICATION",

        OptInTracking = 70 => "USER_OPT_IN_TRACKING",
        OptOutTracking = 71 => "USER_OPT_OUT_TRACKING",
        OptInPush = 72 => "USER_OPT_IN_PUSH_NOTIFICATION",
        OptOutPush = 73 => "USER_OPT_OUT_PUSH_NOTIFICATION",
        OptInInApp = 74 => "USER_OPT_IN_INAPP_MESSAGES",
        OptOutInApp = 75 => "USER_OPT_OUT_INAPP_MESSAGES",

        UserProfilePush = 40 => "USER_PROFILE_PUSH",

        GeofenceEnter = 91 => "GEOFENCE_ENTER",
        GeofenceExit = 93 => "GEOFENCE_EXIT",
    }
}

impl EventCode {
    /// The event type every occurrence of this catalog entry is tracked under.
    pub fn event_type(&self) -> EventType {
        match self {
            Self::UserCustomEvent => EventType::Custom,
            Self::AppInstalled
            | Self::AppUpdated
            | Self::AppCrashed
            | Self::AppReinstalled
            | Self::FirstAppLaunched
            | Self::AppLaunched => EventType::LifeCycle,
            Self::PushDelivered | Self::PushClicked | Self::PushDismissed | Self::PushReplied => {
                EventType::Push
            }
            Self::InAppViewed | Self::InAppClicked | Self::InAppClosed => EventType::InApp,
            Self::InboxDelivered | Self::InboxViewed | Self::InboxClicked | Self::InboxDismissed => {
                EventType::AppInbox
            }
            Self::DeviceDataDump
            | Self::PushTokenGenerated
            | Self::PushTokenFailed
            | Self::PushTokenRefreshed
            | Self::DeviceDetailsUpdated
            | Self::AppLocationEnabled
            | Self::AppLocationDisabled
            | Self::UserLoggedIn
            | Self::UserLoggedOut
            | Self::UserEnabledPush
            | Self::UserDisabledPush
            | Self::OptInTracking
            | Self::OptOutTracking
            | Self::OptInPush
            | Self::OptOutPush
            | Self::OptInInApp
            | Self::OptOutInApp
            | Self::UserProfilePush
            | Self::GeofenceEnter
            | Self::GeofenceExit => EventType::System,
        }
    }

    /// Whether this entry records an opt-in/opt-out transition.
    ///
    /// Opt events are recorded even while tracking is opted out.
    pub fn is_opt_event(&self) -> bool {
        matches!(
            self,
            Self::OptInTracking
                | Self::OptOutTracking
                | Self::OptInPush
                | Self::OptOutPush
                | Self::OptInInApp
                | Self::OptOutInApp
        )
    }
}

/// Name of a tracked event: a catalog entry or a free-form custom name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventName {
    /// A fixed catalog entry.
    Catalog(EventCode),
    /// An application-defined name (tracked under [`EventType::Custom`]).
    Custom(String),
}

impl EventName {
    /// Build a custom event name.
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    /// Rebuild a name from its stored type and string.
    ///
    /// Custom names are kept verbatim even when they spell a catalog name.
    pub fn from_parts(event_type: EventType, name: &str) -> Self {
        if event_type == EventType::Custom {
            return Self::Custom(name.to_string());
        }
        Self::parse(name)
    }

    /// Resolve a string to a catalog entry, or treat it as custom.
    pub fn parse(name: &str) -> Self {
        match EventCode::parse(name) {
            Ok(EventCode::UserCustomEvent) | Err(_) => Self::Custom(name.to_string()),
            Ok(code) => Self::Catalog(code),
        }
    }

    /// The string form stored and sent to the backend.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Catalog(code) => code.as_str(),
            Self::Custom(name) => name,
        }
    }

    /// Backend numeric identifier; every custom event shares code 0.
    pub fn code(&self) -> u16 {
        match self {
            Self::Catalog(code) => code.code(),
            Self::Custom(_) => EventCode::UserCustomEvent.code(),
        }
    }

    /// The catalog entry, if any.
    pub fn catalog(&self) -> Option<EventCode> {
        match self {
            Self::Catalog(code) => Some(*code),
            Self::Custom(_) => None,
        }
    }

    /// Whether this records an opt-in/opt-out transition.
    pub fn is_opt_event(&self) -> bool {
        self.catalog().is_some_and(|code| code.is_opt_event())
    }
}

impl From<EventCode> for EventName {
    fn from(code: EventCode) -> Self {
        Self::Catalog(code)
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::parse(&value))
    }
}
