//! Inbox message commands.

use chrono::{Duration, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use beacon_core::error::AppError;
use beacon_entity::inbox::{InboxFilter, InboxMessage, InboxStatus};

/// Arguments for inbox commands
#[derive(Debug, Args)]
pub struct InboxArgs {
    /// Inbox subcommand
    #[command(subcommand)]
    pub command: InboxCommand,
}

/// Inbox subcommands
#[derive(Debug, Subcommand)]
pub enum InboxCommand {
    /// List messages, newest first
    List {
        /// Filter (all, inbox, read, unread)
        #[arg(long, default_value = "inbox")]
        filter: InboxFilter,
    },
    /// Show one message with its payload
    Show {
        /// Transaction ID
        trid: String,
    },
    /// Change a message status (viewed, read, deleted)
    Status {
        /// Transaction ID
        trid: String,
        /// New status
        status: InboxStatus,
    },
    /// Number of unread messages
    Unread,
    /// Download every media attachment of a message
    Download {
        /// Transaction ID
        trid: String,
    },
    /// Delete messages published before a cutoff
    Purge {
        /// Age in hours
        #[arg(long)]
        older_than_hours: i64,
        /// Only messages the user deleted
        #[arg(long)]
        deleted_only: bool,
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
}

/// Inbox display row
#[derive(Debug, Serialize, Tabled)]
struct InboxRow {
    trid: String,
    status: String,
    title: String,
    published: String,
    media: String,
    downloading: String,
}

impl From<&InboxMessage> for InboxRow {
    fn from(m: &InboxMessage) -> Self {
        let payload = &m.record.payload;
        let slots = payload.media_slots();
        let local = slots
            .iter()
            .filter(|slot| {
                payload
                    .media_at(**slot)
                    .is_some_and(|media| media.local_path.is_some())
            })
            .count();
        Self {
            trid: m.record.trid.clone(),
            status: output::or_dash(m.record.status),
            title: payload.title.clone(),
            published: m.record.published_at.format("%Y-%m-%d %H:%M").to_string(),
            media: format!("{}/{}", local, slots.len()),
            downloading: m
                .media_download_in_progress
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// Execute inbox commands
pub async fn execute(
    args: &InboxArgs,
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
    args: &InboxArgs,
    format: OutputFormat,
) -> Result<(), AppError> {
    let inbox = beacon.inbox();

    match &args.command {
        InboxCommand::List { filter } => {
            let messages = inbox.query(*filter).await?;
            let rows: Vec<InboxRow> = messages.iter().map(InboxRow::from).collect();
            output::print_list(&rows, format);
        }
        InboxCommand::Show { trid } => {
            let message = inbox
                .get(trid)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Inbox message '{}' not found", trid)))?;
            output::print_item(&message, format);
        }
        InboxCommand::Status { trid, status } => {
            let notifications = beacon.notifications();
            let record = match status {
                InboxStatus::Viewed => notifications.mark_viewed(trid).await?,
                InboxStatus::Read => notifications.open(trid).await?,
                InboxStatus::Deleted => notifications.dismiss(trid).await?,
            };
            output::print_success(&format!(
                "{} is now {}",
                record.trid,
                output::or_dash(record.status)
            ));
        }
        InboxCommand::Unread => {
            println!("Unread messages: {}", inbox.unread_count().await?);
        }
        InboxCommand::Download { trid } => {
            let handles = beacon.media().start_all(trid).await?;
            if handles.is_empty() {
                output::print_warning("Nothing to download.");
                return Ok(());
            }
            let started = handles.len();
            for handle in handles {
                if let Err(e) = handle.await {
                    output::print_error(&format!("Download task failed: {}", e));
                }
            }
            let message = inbox
                .get(trid)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Inbox message '{}' not found", trid)))?;
            output::print_success(&format!("Finished {} downloads", started));
            output::print_list(&[InboxRow::from(&message)], format);
        }
        InboxCommand::Purge {
            older_than_hours,
            deleted_only,
            force,
        } => {
            let hours = Duration::try_hours(*older_than_hours)
                .ok_or_else(|| AppError::validation("older-than-hours is out of range"))?;
            let scope = if *deleted_only { "deleted " } else { "" };
            let prompt = format!(
                "Delete {}inbox messages older than {} hours?",
                scope, older_than_hours
            );
            if !super::confirm(&prompt, *force)? {
                println!("Cancelled.");
                return Ok(());
            }
            let status = deleted_only.then_some(InboxStatus::Deleted);
            let removed = inbox.purge(Utc::now() - hours, status).await?;
            output::print_success(&format!("Purged {} inbox messages", removed));
        }
    }

    Ok(())
}
