//! Change Sync Main Entry Point
//!
//! Consumes change notifications from SQS and projects them into the OpenSearch
//! collections until interrupted.

use std::env;
use std::time::Duration;

use change_sync::{Dependencies, SyncError};
use dotenv::dotenv;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Interval between status log lines.
const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Initialize tracing/logging.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("change_sync=info,change_sync_repository=info"));

    let json = env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .init();

        info!(
            service_name = "change-sync",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with JSON format"
        );
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .init();

        info!(
            service_name = "change-sync",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with console output"
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), SyncError> {
    dotenv().ok();
    init_tracing();

    info!("Starting change sync");

    let deps = match Dependencies::new().await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    let manager = deps.manager;
    if let Err(e) = manager.start().await {
        error!(error = %e, "Failed to start sync manager");
        return Err(e);
    }

    let mut status_interval = tokio::time::interval(STATUS_LOG_INTERVAL);
    status_interval.tick().await;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!(error = %e, "Failed to listen for shutdown signal");
                }
                info!("Shutdown signal received");
                break;
            }
            _ = status_interval.tick() => {
                let status = manager.get_status();
                info!(
                    running = status.running,
                    received = status.metrics.received,
                    processed = status.metrics.processed,
                    failed = status.metrics.failed,
                    error_rate = status.metrics.error_rate,
                    avg_ms = status.metrics.processing_time.average_ms,
                    "Sync progress"
                );
            }
        }
    }

    manager.shutdown().await;
    info!("Change sync stopped");
    Ok(())
}
