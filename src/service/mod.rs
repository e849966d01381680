//! Service layer for the project-tracker monitoring service
//!
//! This module contains the application state, the HTTP server with its
//! request interceptor, health checks and background task management.

pub mod app;
pub mod health;
pub mod interceptor;
pub mod server;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus};
pub use interceptor::{record_request_metrics, RequestCaller};
pub use server::{build_router, ApiServer, ApiServerConfig, HeartbeatRequest};
