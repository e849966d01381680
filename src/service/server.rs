//! HTTP server for the monitoring endpoints
//!
//! This module hosts the heartbeat and admin statistics endpoints, health
//! probes and the Prometheus exposition using Axum. Every route, including
//! the 404 fallback, is wrapped by the request interceptor.

use crate::error::MonitorError;
use crate::metrics::MetricsReport;
use crate::service::app::AppState;
use crate::service::health::{HealthCheck, HealthStatus};
use crate::service::interceptor::{record_request_metrics, RequestCaller};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Path of the client heartbeat endpoint
pub const HEARTBEAT_PATH: &str = "/api/monitor/heartbeat";

/// Path of the admin metrics snapshot endpoint
pub const ADMIN_METRICS_PATH: &str = "/api/admin/metrics";

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host to bind to (typically "0.0.0.0" for all interfaces)
    pub host: String,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Heartbeat body sent by browser tabs
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    #[serde(default)]
    pub client_id: Option<String>,
}

/// HTTP server that provides the monitoring endpoints
pub struct ApiServer {
    config: ApiServerConfig,
    state: Arc<AppState>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(config: ApiServerConfig, state: Arc<AppState>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            state,
            shutdown_tx,
        }
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid API server address")?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        info!("API server listening on http://{}", addr);
        Ok(listener)
    }

    /// Serve requests on an already bound listener until stopped
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let app = build_router(self.state.clone());

        // Create a shutdown receiver for this task
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("API server shutdown signal received");
            })
            .await?;

        info!("API server stopped");
        Ok(())
    }

    /// Bind and serve
    pub async fn start(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Stop the server
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping API server...");

        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to API server: {}", e);
        }

        Ok(())
    }
}

/// Create the Axum router with all monitoring endpoints
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/alive", get(alive_handler))
        .route("/metrics", get(metrics_handler))
        .route(HEARTBEAT_PATH, post(heartbeat_handler))
        .route(ADMIN_METRICS_PATH, get(admin_metrics_handler))
        .fallback(not_found_handler)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            record_request_metrics,
        ))
        .with_state(state)
}

/// Root endpoint handler - shows service information
async fn root_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "message": "Student Project Management API monitor",
        "service": state.config().service.name,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "ready": "/ready",
            "alive": "/alive",
            "metrics": "/metrics",
            "heartbeat": HEARTBEAT_PATH,
            "admin_metrics": ADMIN_METRICS_PATH
        }
    }))
}

/// Lightweight health check endpoint handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Health check requested");

    let name = state.config().service.name.clone();
    match HealthCheck::liveness_check(state).await {
        Ok(HealthStatus::Healthy) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "service": name,
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Ok(HealthStatus::Degraded) => (
            StatusCode::OK,
            Json(json!({
                "status": "degraded",
                "service": name,
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Ok(HealthStatus::Unhealthy) | Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": name,
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
    }
}

/// Readiness check endpoint handler
async fn ready_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Readiness check requested");

    match HealthCheck::readiness_check(state).await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "Ready"),
        Ok(HealthStatus::Degraded) => (StatusCode::OK, "Degraded but ready"),
        Ok(HealthStatus::Unhealthy) => (StatusCode::SERVICE_UNAVAILABLE, "Not ready"),
        Err(e) => {
            error!("Readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
        }
    }
}

/// Liveness check endpoint handler
async fn alive_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match HealthCheck::liveness_check(state).await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "Alive"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "Not alive"),
    }
}

/// Prometheus metrics endpoint handler
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    let prometheus = state.prometheus();

    match prometheus.encode_text() {
        Ok(metrics_output) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus.content_type())],
            metrics_output,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

/// Client heartbeat handler; always acknowledges
async fn heartbeat_handler(
    State(state): State<Arc<AppState>>,
    caller: RequestCaller,
    body: Bytes,
) -> impl IntoResponse {
    // Missing or malformed bodies count as an empty client id
    let heartbeat: HeartbeatRequest = serde_json::from_slice(&body).unwrap_or_else(|e| {
        debug!("Unreadable heartbeat body: {}", e);
        HeartbeatRequest::default()
    });

    let client_id = heartbeat.client_id.unwrap_or_default();
    if !client_id.trim().is_empty() {
        state.collector().record_heartbeat(&client_id, caller.id());
        state.prometheus().record_heartbeat();
    }

    (StatusCode::OK, Json(json!({ "ok": true })))
}

/// Admin metrics snapshot handler
async fn admin_metrics_handler(
    State(state): State<Arc<AppState>>,
    caller: RequestCaller,
) -> Result<Json<MetricsReport>, MonitorError> {
    if state.config().auth.require_admin_for_stats {
        match caller.caller() {
            None => {
                return Err(MonitorError::Unauthorized {
                    reason: "a valid bearer token is required".to_string(),
                })
            }
            Some(c) if !c.is_admin() => {
                warn!("Caller {} requested admin metrics without admin role", c.id);
                return Err(MonitorError::Forbidden {
                    reason: "admin role required".to_string(),
                });
            }
            Some(_) => {}
        }
    }

    let report = state.collector().snapshot().map_err(|e| {
        error!("Failed to compute metrics snapshot: {}", e);
        e
    })?;

    Ok(Json(report))
}

async fn not_found_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
