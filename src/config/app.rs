//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! project-tracker monitoring service, including environment variable and
//! TOML file loading and validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub metrics: MetricsSettings,
    pub auth: AuthSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Interface the HTTP server binds to
    pub host: String,
    /// Port for the HTTP API, health and metrics endpoints
    pub http_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Request metrics window settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// How long request events and heartbeats are retained
    pub retention_window_seconds: u64,
    /// Heartbeat age under which a client counts as online
    pub online_window_seconds: u64,
    /// Maximum number of distinct heartbeat client ids tracked
    pub max_tracked_clients: usize,
    /// Interval of the background purge and gauge refresh
    pub maintenance_interval_seconds: u64,
}

/// Bearer token settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HMAC secret shared with the API that issues access tokens
    pub jwt_secret: String,
    /// Require an admin token for the metrics snapshot endpoint
    pub require_admin_for_stats: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "project-tracker".to_string(),
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            http_port: 5000,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            retention_window_seconds: 900, // 15 minutes
            online_window_seconds: 20,
            max_tracked_clients: 10_000,
            maintenance_interval_seconds: 60,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: "jwt-secret-string".to_string(),
            require_admin_for_stats: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file; environment variables still win
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Parse a TOML document; missing sections and keys take defaults
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| anyhow!("Invalid configuration file: {}", e))
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(host) = env::var("HTTP_HOST") {
            self.service.host = host;
        }
        // PORT is what most hosting platforms inject
        if let Ok(port) = env::var("HTTP_PORT").or_else(|_| env::var("PORT")) {
            self.service.http_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HTTP_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Metrics settings
        if let Ok(window) = env::var("METRICS_RETENTION_WINDOW_SECONDS") {
            self.metrics.retention_window_seconds = window.parse().map_err(|_| {
                anyhow!("Invalid METRICS_RETENTION_WINDOW_SECONDS value: {}", window)
            })?;
        }
        if let Ok(window) = env::var("METRICS_ONLINE_WINDOW_SECONDS") {
            self.metrics.online_window_seconds = window
                .parse()
                .map_err(|_| anyhow!("Invalid METRICS_ONLINE_WINDOW_SECONDS value: {}", window))?;
        }
        if let Ok(max_clients) = env::var("METRICS_MAX_TRACKED_CLIENTS") {
            self.metrics.max_tracked_clients = max_clients.parse().map_err(|_| {
                anyhow!("Invalid METRICS_MAX_TRACKED_CLIENTS value: {}", max_clients)
            })?;
        }
        if let Ok(interval) = env::var("METRICS_MAINTENANCE_INTERVAL_SECONDS") {
            self.metrics.maintenance_interval_seconds = interval.parse().map_err(|_| {
                anyhow!(
                    "Invalid METRICS_MAINTENANCE_INTERVAL_SECONDS value: {}",
                    interval
                )
            })?;
        }

        // Auth settings
        if let Ok(secret) = env::var("JWT_SECRET_KEY") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(require_admin) = env::var("REQUIRE_ADMIN_FOR_STATS") {
            self.auth.require_admin_for_stats = require_admin.parse().map_err(|_| {
                anyhow!("Invalid REQUIRE_ADMIN_FOR_STATS value: {}", require_admin)
            })?;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get maintenance interval as Duration
    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.metrics.maintenance_interval_seconds)
    }

    /// Address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.service.host, self.service.http_port)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }
    if config.service.host.is_empty() {
        return Err(anyhow!("HTTP host cannot be empty"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.metrics.maintenance_interval_seconds == 0 {
        return Err(anyhow!("Maintenance interval must be greater than 0"));
    }

    // Validate metrics windows; the report always carries a 5 minute partition
    if config.metrics.retention_window_seconds < 300 {
        return Err(anyhow!(
            "Retention window must be at least 300 seconds, got {}",
            config.metrics.retention_window_seconds
        ));
    }
    if config.metrics.online_window_seconds == 0 {
        return Err(anyhow!("Online window must be greater than 0"));
    }
    if config.metrics.online_window_seconds > config.metrics.retention_window_seconds {
        return Err(anyhow!(
            "Online window ({}s) cannot exceed retention window ({}s)",
            config.metrics.online_window_seconds,
            config.metrics.retention_window_seconds
        ));
    }
    if config.metrics.max_tracked_clients == 0 {
        return Err(anyhow!("Max tracked clients must be greater than 0"));
    }

    // Validate auth settings
    if config.auth.jwt_secret.is_empty() {
        return Err(anyhow!("JWT secret cannot be empty"));
    }

    Ok(())
}
