//! `run` and `once`: the monitoring loop and a single cycle.

use std::path::PathBuf;

use anyhow::Result;
use calendar_core::{AppConfig, ConfigWatcher};
use calendar_manager::{MonitorService, ReportFormatter};
use chrono::Local;
use tokio::sync::watch;

use crate::wiring;

async fn service(config: &AppConfig) -> Result<MonitorService> {
    Ok(MonitorService::new(
        wiring::build_store(config).await?,
        wiring::build_quotes(config),
        wiring::build_notifier(config),
    ))
}

/// Runs cycles until Ctrl-C.
///
/// # Errors
/// Returns an error if the store cannot be opened.
pub async fn run_monitor(
    config: AppConfig,
    config_path: PathBuf,
    profile: Option<String>,
    watch_config: bool,
) -> Result<()> {
    let service = service(&config).await?;

    // The sender must outlive the loop when the file is not watched.
    let (_static_tx, rx) = if watch_config {
        let (watcher, rx) = ConfigWatcher::new(config.clone());
        let watcher = watcher.with_profile(profile);
        tokio::spawn(async move {
            if let Err(e) = watcher.watch(config_path).await {
                tracing::error!(error = %e, "Config watcher stopped");
            }
        });
        (None, rx)
    } else {
        let (tx, rx) = watch::channel(config.clone());
        (Some(tx), rx)
    };

    tokio::select! {
        () = service.run(rx, |report, at| {
            println!("{}", ReportFormatter::format(&report.snapshots, at));
        }) => {}
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
                Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
            }
        }
    }

    tracing::info!("Calendar monitor stopped");
    Ok(())
}

/// Runs a single cycle and prints the dashboard.
///
/// # Errors
/// Returns an error if positions cannot be loaded.
pub async fn run_once(config: AppConfig) -> Result<()> {
    let service = service(&config).await?;
    let now = Local::now();
    let report = service.run_cycle(&now).await?;
    println!("{}", ReportFormatter::format(&report.snapshots, &now));
    if !report.persisted {
        anyhow::bail!("cycle evaluated but positions could not be saved");
    }
    Ok(())
}
