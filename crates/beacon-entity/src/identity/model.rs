//! Identity and consent state.

use serde::{Deserialize, Serialize};

use crate::event::EventCode;

code_enum! {
    /// Consent channel a user can opt in to or out of.
    pub enum OptChannel {
        Tracking = 0 => "tracking",
        Push = 1 => "push",
        InApp = 2 => "inapp",
    }
}

impl OptChannel {
    /// The catalog entry recording an opt transition on this channel.
    pub fn opt_event(&self, opted: bool) -> EventCode {
        match (self, opted) {
            (Self::Tracking, true) => EventCode::OptInTracking,
            (Self::Tracking, false) => EventCode::OptOutTracking,
            (Self::Push, true) => EventCode::OptInPush,
            (Self::Push, false) => EventCode::OptOutPush,
            (Self::InApp, true) => EventCode::OptInInApp,
            (Self::InApp, false) => EventCode::OptOutInApp,
        }
    }

    /// Preference key the flag is persisted under.
    pub fn preference_key(&self) -> &'static str {
        match self {
            Self::Tracking => keys::OPT_TRACKING,
            Self::Push => keys::OPT_PUSH,
            Self::InApp => keys::OPT_INAPP,
        }
    }
}

/// Session-wide identity and consent flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityState {
    /// Current user identity, if any.
    pub user_identity: Option<String>,
    pub opted_tracking: bool,
    pub opted_push: bool,
    pub opted_inapp: bool,
}

impl Default for IdentityState {
    fn default() -> Self {
        Self {
            user_identity: None,
            opted_tracking: true,
            opted_push: true,
            opted_inapp: true,
        }
    }
}

impl IdentityState {
    /// Current flag for `channel`.
    pub fn opted(&self, channel: OptChannel) -> bool {
        match channel {
            OptChannel::Tracking => self.opted_tracking,
            OptChannel::Push => self.opted_push,
            OptChannel::InApp => self.opted_inapp,
        }
    }

    /// Set the flag for `channel`, returning whether it changed.
    pub fn set_opted(&mut self, channel: OptChannel, opted: bool) -> bool {
        let flag = match channel {
            OptChannel::Tracking => &mut self.opted_tracking,
            OptChannel::Push => &mut self.opted_push,
            OptChannel::InApp => &mut self.opted_inapp,
        };
        let changed = *flag != opted;
        *flag = opted;
        changed
    }
}

/// Keys of the persisted preference set.
pub mod keys {
    pub const USER_IDENTITY: &str = "user_identity";
    pub const OPT_TRACKING: &str = "opt_tracking";
    pub const OPT_PUSH: &str = "opt_push";
    pub const OPT_INAPP: &str = "opt_inapp";
    pub const DEVICE_GUID: &str = "device_guid";
    pub const PUSH_TOKEN: &str = "push_token";
    pub const APP_VERSION: &str = "app_version";
    pub const FIRST_LAUNCH_TRACKED: &str = "first_launch_tracked";
}
