//! Main application state and service coordination
//!
//! This module contains the composition root: it builds the single metrics
//! collector shared by every request handler, the Prometheus exporter and the
//! caller resolver, and owns the HTTP server and background tasks.

use crate::auth::{CallerResolver, JwtCallerResolver};
use crate::config::{validate_config, AppConfig};
use crate::metrics::{Clock, CollectorConfig, MetricsCollector, PrometheusMetrics, SystemClock};
use crate::service::server::{ApiServer, ApiServerConfig};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Sliding-window request metrics, one per process
    collector: Arc<MetricsCollector>,

    /// Cumulative Prometheus metrics
    prometheus: Arc<PrometheusMetrics>,

    /// Bearer token resolution
    resolver: Arc<dyn CallerResolver>,

    /// HTTP server, present once started
    server: Mutex<Option<Arc<ApiServer>>>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    started_at: Instant,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing {} monitoring service", config.service.name);

        validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let resolver: Arc<dyn CallerResolver> =
            Arc::new(JwtCallerResolver::new(&config.auth.jwt_secret));

        Self::with_components(config, Arc::new(SystemClock), resolver)
    }

    /// Build the state from explicit collaborators
    pub fn with_components(
        config: AppConfig,
        clock: Arc<dyn Clock>,
        resolver: Arc<dyn CallerResolver>,
    ) -> Result<Self, ServiceError> {
        let collector_config = CollectorConfig::from(&config.metrics);
        info!(
            "Metrics window: retention={}s, online={}s, max_clients={}",
            collector_config.retention_window.as_secs(),
            collector_config.online_window.as_secs(),
            collector_config.max_tracked_clients
        );
        let collector = Arc::new(MetricsCollector::with_clock(collector_config, clock));

        let prometheus =
            Arc::new(
                PrometheusMetrics::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create Prometheus metrics: {}", e),
                })?,
            );

        Ok(Self {
            config,
            collector,
            prometheus,
            resolver,
            server: Mutex::new(None),
            background_tasks: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        })
    }

    /// Start the HTTP server and background maintenance
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting {} monitoring service", self.config.service.name);

        // Mark as running
        *self.is_running.write().await = true;

        self.start_http_server().await?;
        self.start_background_tasks().await;

        info!("✅ {} started successfully", self.config.service.name);
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of {}", self.config.service.name);

        // Mark as not running
        *self.is_running.write().await = false;

        if let Some(server) = self.server.lock().await.take() {
            if let Err(e) = server.stop().await {
                warn!("Failed to stop HTTP server: {}", e);
            } else {
                info!("✅ HTTP server stopped");
            }
        }

        self.stop_background_tasks().await;

        match self.collector.snapshot() {
            Ok(report) => info!(
                "Final window: {} requests, {} active users, {} online clients",
                report.totals.requests_15m,
                report.totals.active_users_15m,
                report.totals.online_clients_1m
            ),
            Err(e) => {
                return Err(ServiceError::BackgroundTask {
                    message: format!("Failed to get final snapshot: {}", e),
                })
            }
        }

        info!("✅ {} shutdown completed", self.config.service.name);
        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Mark the service as running without binding a listener
    pub async fn mark_running(&self) {
        *self.is_running.write().await = true;
    }

    /// Get the shared metrics collector
    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Get the Prometheus exporter
    pub fn prometheus(&self) -> Arc<PrometheusMetrics> {
        self.prometheus.clone()
    }

    /// Get the caller resolver
    pub fn resolver(&self) -> Arc<dyn CallerResolver> {
        self.resolver.clone()
    }

    /// Time since the state was built
    pub fn uptime(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Start the HTTP server
    async fn start_http_server(self: &Arc<Self>) -> Result<(), ServiceError> {
        let server_config = ApiServerConfig {
            host: self.config.service.host.clone(),
            port: self.config.service.http_port,
        };
        let server = Arc::new(ApiServer::new(server_config, self.clone()));

        // Bind before spawning so address errors surface here
        let listener = server
            .bind()
            .await
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to bind HTTP server: {}", e),
            })?;

        let server_handle = {
            let server = server.clone();
            tokio::spawn(async move {
                if let Err(e) = server.serve(listener).await {
                    error!("HTTP server failed: {}", e);
                } else {
                    info!("HTTP server task completed");
                }
            })
        };

        *self.server.lock().await = Some(server);
        self.background_tasks.lock().await.push(server_handle);

        info!("✅ HTTP server started on {}", self.config.bind_address());
        Ok(())
    }

    /// Start background maintenance tasks
    async fn start_background_tasks(&self) {
        let interval_duration = self.config.maintenance_interval();
        info!(
            "Starting metrics maintenance task ({}s interval)...",
            interval_duration.as_secs()
        );

        let maintenance_task = {
            let collector = self.collector.clone();
            let prometheus = self.prometheus.clone();
            let is_running = self.is_running.clone();
            let started_at = self.started_at;

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(interval_duration);
                info!("Metrics maintenance task started");

                while *is_running.read().await {
                    interval.tick().await;

                    match collector.purge() {
                        Ok((events, heartbeats)) if events + heartbeats > 0 => {
                            debug!(
                                "Purged {} expired events and {} stale heartbeats",
                                events, heartbeats
                            );
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("Metrics purge failed: {}", e);
                        }
                    }

                    prometheus.update_window(collector.len(), collector.tracked_clients());
                    prometheus.update_uptime(started_at.elapsed());
                }

                info!("Metrics maintenance task stopped");
            })
        };

        self.background_tasks.lock().await.push(maintenance_task);
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&self) {
        let mut tasks = self.background_tasks.lock().await;
        let task_count = tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        info!("✅ All {} background tasks stopped", task_count);
    }
}
