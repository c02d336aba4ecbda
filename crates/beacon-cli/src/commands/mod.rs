//! CLI command definitions and dispatch.

pub mod events;
pub mod identity;
pub mod inbox;
pub mod migrate;
pub mod sweep;
pub mod track;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use beacon_core::config::AppConfig;
use beacon_core::error::AppError;
use beacon_sdk::Beacon;

/// Beacon local engagement store operations
#[derive(Debug, Parser)]
#[command(name = "beacon", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/beacon.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Track an event
    Track(track::TrackArgs),
    /// Inspect, flush and purge the event queue
    Events(events::EventsArgs),
    /// User identity, opt flags and stored preferences
    Identity(identity::IdentityArgs),
    /// Inbox messages
    Inbox(inbox::InboxArgs),
    /// Run the retention sweep once
    Sweep,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, &self.config, self.format).await,
            Commands::Track(args) => track::execute(args, &self.config, self.format).await,
            Commands::Events(args) => events::execute(args, &self.config, self.format).await,
            Commands::Identity(args) => identity::execute(args, &self.config, self.format).await,
            Commands::Inbox(args) => inbox::execute(args, &self.config, self.format).await,
            Commands::Sweep => sweep::execute(&self.config, self.format).await,
        }
    }
}

/// Helper: load configuration from file
pub fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    AppConfig::load(config_path)
}

/// Helper: open an instance over the configured store without starting it
pub async fn open_beacon(config_path: &str) -> Result<Beacon, AppError> {
    let config = load_config(config_path)?;
    Beacon::builder(config).build().await
}

/// Helper: ask before a destructive operation unless `force` is set
pub fn confirm(prompt: &str, force: bool) -> Result<bool, AppError> {
    if force {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| AppError::internal(format!("Input error: {}", e)))
}
