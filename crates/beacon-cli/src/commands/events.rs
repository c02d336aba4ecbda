//! Event queue commands.

use chrono::{Duration, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use beacon_core::error::AppError;
use beacon_entity::event::{EventRecord, EventStatus};
use beacon_worker::FlushReport;

/// Arguments for event commands
#[derive(Debug, Args)]
pub struct EventsArgs {
    /// Event subcommand
    #[command(subcommand)]
    pub command: EventsCommand,
}

/// Event subcommands
#[derive(Debug, Subcommand)]
pub enum EventsCommand {
    /// List queued records
    List {
        /// Only records in this status (pending, in_progress, success, failed)
        #[arg(short, long)]
        status: Option<EventStatus>,
        /// Maximum number of records
        #[arg(short, long, default_value = "50")]
        limit: u32,
    },
    /// Count records per status
    Stats,
    /// Send pending records to the backend now
    Flush {
        /// Keep flushing until nothing is left to send
        #[arg(long)]
        all: bool,
    },
    /// Delete delivered and failed records older than a cutoff
    Purge {
        /// Age in hours
        #[arg(long)]
        older_than_hours: i64,
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
}

/// Event display row
#[derive(Debug, Serialize, Tabled)]
struct EventRow {
    id: String,
    #[tabled(rename = "type")]
    event_type: String,
    name: String,
    status: String,
    identity: String,
    attempts: u32,
    next_attempt: String,
    created: String,
}

impl From<&EventRecord> for EventRow {
    fn from(r: &EventRecord) -> Self {
        Self {
            id: r.id.to_string(),
            event_type: r.event_type.to_string(),
            name: r.event_name.to_string(),
            status: r.status.to_string(),
            identity: output::or_dash(r.user_identity.as_deref()),
            attempts: r.attempts,
            next_attempt: output::or_dash(r.next_attempt_at.map(|t| t.format("%Y-%m-%d %H:%M:%S"))),
            created: r.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct StatusCountRow {
    status: String,
    count: i64,
}

/// Execute event commands
pub async fn execute(
    args: &EventsArgs,
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
    args: &EventsArgs,
    format: OutputFormat,
) -> Result<(), AppError> {
    let events = beacon.events();

    match &args.command {
        EventsCommand::List { status, limit } => {
            let records = match status {
                Some(status) => {
                    let mut records = events.with_status(*status).await?;
                    records.truncate(*limit as usize);
                    records
                }
                None => events.recent(*limit).await?,
            };
            let rows: Vec<EventRow> = records.iter().map(EventRow::from).collect();
            output::print_list(&rows, format);
        }
        EventsCommand::Stats => {
            let rows: Vec<StatusCountRow> = events
                .count_by_status()
                .await?
                .into_iter()
                .map(|(status, count)| StatusCountRow {
                    status: status.to_string(),
                    count,
                })
                .collect();
            output::print_list(&rows, format);
        }
        EventsCommand::Flush { all } => {
            let mut total = FlushReport::default();
            loop {
                let report = beacon.flush().await?;
                total.claimed += report.claimed;
                total.sent += report.sent;
                total.failed += report.failed;
                total.dropped += report.dropped;
                // Failed records wait for their backoff; stop instead of spinning.
                if !*all || report.is_empty() || report.sent == 0 {
                    break;
                }
            }
            output::print_item(&total, format);
        }
        EventsCommand::Purge {
            older_than_hours,
            force,
        } => {
            let hours = Duration::try_hours(*older_than_hours)
                .ok_or_else(|| AppError::validation("older-than-hours is out of range"))?;
            let prompt = format!(
                "Delete delivered and failed events older than {} hours?",
                older_than_hours
            );
            if !super::confirm(&prompt, *force)? {
                println!("Cancelled.");
                return Ok(());
            }
            let removed = events
                .purge(Utc::now() - hours, &[EventStatus::Success, EventStatus::Failed])
                .await?;
            output::print_success(&format!("Purged {} events", removed));
        }
    }

    Ok(())
}
