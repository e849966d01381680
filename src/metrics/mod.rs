//! Metrics and monitoring for the project-tracker service
//!
//! This module provides the in-memory sliding-window collector behind the
//! admin statistics endpoint, and the Prometheus exposition of the same
//! traffic.

pub mod clock;
pub mod collector;
pub mod exporter;
pub mod report;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collector::{CollectorConfig, MetricsCollector};
pub use exporter::{PrometheusMetrics, RequestTimer};
pub use report::{MetricsReport, Totals, WindowStats};
