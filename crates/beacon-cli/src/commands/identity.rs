//! Identity, consent and preference commands.

use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use beacon_core::error::AppError;
use beacon_entity::event::EventRecord;
use beacon_entity::identity::OptChannel;

/// Arguments for identity commands
#[derive(Debug, Args)]
pub struct IdentityArgs {
    /// Identity subcommand
    #[command(subcommand)]
    pub command: IdentityCommand,
}

/// Identity subcommands
#[derive(Debug, Subcommand)]
pub enum IdentityCommand {
    /// Show identity, device GUID and opt flags
    Show,
    /// Log a user in
    Login {
        /// User identity
        identity: String,
    },
    /// Log the current user out
    Logout {
        /// Also forget the identity
        #[arg(long)]
        clear: bool,
    },
    /// Change a consent flag
    Opt {
        /// Channel (tracking, push, inapp)
        channel: OptChannel,
        /// New state
        #[arg(value_enum)]
        state: OptState,
    },
    /// Register a push token
    PushToken {
        /// Token issued by the push gateway
        token: String,
    },
    /// Dump every stored preference
    Preferences,
}

/// Consent state argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OptState {
    In,
    Out,
}

#[derive(Debug, Serialize)]
struct IdentityView {
    user_identity: Option<String>,
    device_guid: String,
    push_token: Option<String>,
    opted_tracking: bool,
    opted_push: bool,
    opted_inapp: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct PreferenceRow {
    key: String,
    value: String,
}

/// Execute identity commands
pub async fn execute(
    args: &IdentityArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let beacon = super::open_beacon(config_path).await?;
    let result = run(&beacon, args, format).await;
    beacon.shutdown().await?;
    result
}

async fn run(
    beacon: &beacon_sdk::Beacon,
    args: &IdentityArgs,
    format: OutputFormat,
) -> Result<(), AppError> {
    let identity = beacon.identity();

    match &args.command {
        IdentityCommand::Show => {
            let state = identity.state().await;
            let view = IdentityView {
                user_identity: state.user_identity,
                device_guid: identity.device_guid().to_string(),
                push_token: identity.push_token().await?,
                opted_tracking: state.opted_tracking,
                opted_push: state.opted_push,
                opted_inapp: state.opted_inapp,
            };
            output::print_item(&view, format);
        }
        IdentityCommand::Login { identity: user } => {
            let tracked = identity.login(user).await?;
            report(&format!("Logged in as {}", user), tracked);
        }
        IdentityCommand::Logout { clear } => {
            let tracked = identity.logout(*clear).await?;
            report("Logged out", tracked);
        }
        IdentityCommand::Opt { channel, state } => {
            let opted = *state == OptState::In;
            if identity.has_opted(*channel).await == opted {
                output::print_warning(&format!("{} is already opted {:?}", channel, state));
                return Ok(());
            }
            let tracked = identity.set_opt(*channel, opted).await?;
            report(&format!("{} opted {:?}", channel, state), tracked);
        }
        IdentityCommand::PushToken { token } => match identity.register_push_token(token).await? {
            Some(_) => output::print_success("Push token registered"),
            None => output::print_warning("Push token unchanged or tracking opted out"),
        },
        IdentityCommand::Preferences => {
            let rows: Vec<PreferenceRow> = identity
                .stored_preferences()
                .await?
                .into_iter()
                .map(|(key, value)| PreferenceRow { key, value })
                .collect();
            output::print_list(&rows, format);
        }
    }

    Ok(())
}

fn report(message: &str, tracked: Option<EventRecord>) {
    output::print_success(message);
    match tracked {
        Some(record) => output::print_kv("tracked", &format!("{} ({})", record.event_name, record.id)),
        None => output::print_kv("tracked", "suppressed (tracking opted out)"),
    }
}
