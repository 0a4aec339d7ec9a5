//! Connectivity watchdog.
//!
//! A [`Monitor`] probes one target every check interval, debounces the
//! attempts into a single up/down verdict, and reports each outage exactly
//! once when it begins and once when it ends.

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

mod api;
mod config;
mod debounce;
mod engine;
mod error;
mod logging;
mod models;
mod notify;
mod outage;
mod probe;
mod queue;
mod stats;

use crate::config::{MonitorConfig, ProbeKind};
use crate::engine::Monitor;

#[tokio::main]
async fn main() -> Result<()> {
    // Until the configured subscriber exists, errors go to a console-only one.
    let config = tracing::subscriber::with_default(logging::console_subscriber(), MonitorConfig::load)
        .context("Invalid configuration")?;
    let _log_guard = logging::init(config.log_file.as_deref())?;

    info!("Target: {}", config.target);
    info!("Failure threshold: {}", config.failure_threshold);
    info!("Check interval: {}s, retry delay: {}s", config.check_interval, config.retry_delay);
    match &config.probe {
        ProbeKind::Icmp { .. } => info!("Probe: ICMP echo"),
        ProbeKind::Tcp { port, .. } => info!("Probe: TCP connect to port {}", port),
    }
    if let Some(path) = &config.log_file {
        info!("Log file: {}", path.display());
    }

    let prober = probe::from_config(&config.probe, &config.target).map_err(|e| {
        error!("Cannot start probing: {}", e);
        e
    })?;
    let notifier = notify::from_config(config.notifier.as_ref());
    let monitor = Monitor::new(config.clone(), prober, notifier)?;

    if let Some(port) = config.stats_port {
        let stats = monitor.stats_handle();
        tokio::spawn(async move {
            if let Err(e) = api::start_server(port, stats).await {
                error!("Stats endpoint failed: {:#}", e);
            }
        });
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received. Stopping monitor...");
            let _ = stop_tx.send(true);
        }
    });

    monitor.run(stop_rx).await.map_err(|e| {
        error!("Monitor engine failed: {}", e);
        e
    })?;
    Ok(())
}
