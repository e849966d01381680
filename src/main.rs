//! project-tracker binary
//!
//! Loads configuration, starts the monitoring API and runs until SIGINT or
//! SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use project_tracker::config::{validate_config, AppConfig};
use project_tracker::service::{AppState, HealthCheck, HealthStatus};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

/// Sliding-window request and presence monitoring for the project API
#[derive(Parser, Debug)]
#[command(name = "project-tracker", version)]
struct Args {
    /// TOML configuration file; environment variables still override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Shorthand for --log-level debug
    #[arg(short, long)]
    debug: bool,

    /// Interface to bind
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// HTTP port
    #[arg(long, value_name = "PORT")]
    http_port: Option<u16>,

    /// Seconds request events and heartbeats are retained
    #[arg(long, value_name = "SECONDS")]
    retention_window: Option<u64>,

    /// Heartbeat age in seconds under which a client counts as online
    #[arg(long, value_name = "SECONDS")]
    online_window: Option<u64>,

    /// Validate the configuration and exit
    #[arg(long)]
    dry_run: bool,

    /// Build the service without binding, check the metrics window, and exit
    /// non-zero when it is unusable. Does not probe a running process.
    #[arg(long)]
    health_check: bool,
}

impl Args {
    /// Configuration from file or environment with command-line overrides
    fn load_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::from_env()?,
        };

        let service = &mut config.service;
        if let Some(level) = &self.log_level {
            service.log_level = level.clone();
        }
        if self.debug {
            service.log_level = "debug".to_string();
        }
        if let Some(host) = &self.host {
            service.host = host.clone();
        }
        if let Some(port) = self.http_port {
            service.http_port = port;
        }

        let metrics = &mut config.metrics;
        if let Some(seconds) = self.retention_window {
            metrics.retention_window_seconds = seconds;
        }
        if let Some(seconds) = self.online_window {
            metrics.online_window_seconds = seconds;
        }

        validate_config(&config)?;
        Ok(config)
    }
}

fn init_logging(log_level: &str) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

/// Resolves on the first SIGINT or SIGTERM
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl+C")?;
                info!("Received SIGINT");
            }
            _ = terminate.recv() => info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        info!("Received SIGINT");
    }

    Ok(())
}

async fn health_check(config: AppConfig) -> Result<bool> {
    let state = AppState::new(config).await?;
    let health = HealthCheck::preflight(&state);

    println!("Health Check: {}", health.status);
    for check in &health.checks {
        match &check.message {
            Some(message) => println!("  {}: {} ({})", check.name, check.status, message),
            None => println!("  {}: {}", check.name, check.status),
        }
    }

    Ok(health.status == HealthStatus::Healthy)
}

async fn serve(config: AppConfig) -> Result<()> {
    info!(
        "🚀 {} v{} on {} (retention {}s, online {}s, admin-only stats: {})",
        config.service.name,
        project_tracker::VERSION,
        config.bind_address(),
        config.metrics.retention_window_seconds,
        config.metrics.online_window_seconds,
        config.auth.require_admin_for_stats
    );

    let state = Arc::new(AppState::new(config.clone()).await?);
    state.start().await?;

    shutdown_signal().await?;
    info!("🛑 Shutting down");

    match tokio::time::timeout(config.shutdown_timeout(), state.shutdown()).await {
        Ok(result) => result?,
        Err(_) => warn!(
            "Shutdown did not finish within {}s",
            config.service.shutdown_timeout_seconds
        ),
    }

    info!("🛑 {} stopped", config.service.name);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = args.load_config().context("Invalid configuration")?;
    init_logging(&config.service.log_level)?;

    if args.dry_run {
        // The auth section carries the signing secret
        info!(
            "Configuration valid: service={:?} metrics={:?}",
            config.service, config.metrics
        );
        return Ok(());
    }

    if args.health_check {
        let healthy = health_check(config).await?;
        std::process::exit(if healthy { 0 } else { 1 });
    }

    serve(config).await
}
