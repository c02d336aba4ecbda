//! Beacon Agent: long-running engagement SDK host.
//!
//! Loads configuration, starts a `Beacon` instance and keeps dispatching
//! until interrupted.

use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{EnvFilter, fmt};

use beacon_core::config::AppConfig;
use beacon_core::error::AppError;
use beacon_sdk::{Beacon, CoreEvent};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Agent error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("BEACON_CONFIG").unwrap_or_else(|_| "config/beacon.toml".to_string());
    AppConfig::load(&config_path)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main agent run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Beacon Agent v{}", env!("CARGO_PKG_VERSION"));

    let beacon = Beacon::builder(config).build().await?;
    let mut core_events = beacon.subscribe();
    beacon.start().await?;

    tracing::info!("Beacon Agent running; press Ctrl+C to stop");
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received, starting graceful shutdown...");
                break;
            }
            event = core_events.recv() => match event {
                Ok(event) => log_core_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Core event log lagged; skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    beacon.shutdown().await?;
    tracing::info!("Beacon Agent stopped");
    Ok(())
}

fn log_core_event(event: &CoreEvent) {
    match event {
        CoreEvent::DispatchFailed {
            event_id,
            event_name,
            attempts,
            reason,
        } => tracing::warn!(
            %event_id,
            event_name = %event_name,
            attempts,
            "Event dropped: {}",
            reason
        ),
        CoreEvent::MediaDownloadFailed { trid, key, reason } => {
            tracing::warn!(trid = %trid, key = %key, "Media download failed: {}", reason)
        }
        other => tracing::info!("Core event: {:?}", other),
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
