//! Project Tracker - request and presence monitoring for the project API
//!
//! This crate keeps an in-memory sliding window of completed HTTP requests
//! and client heartbeats, and serves aggregated snapshots (request counts,
//! error counts, latency averages and percentiles, active and online users)
//! to administrators.

pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MonitorError, Result};
pub use types::*;

// Re-export key components
pub use auth::{CallerResolver, JwtCallerResolver, StaticCallerResolver};
pub use metrics::{MetricsCollector, MetricsReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
