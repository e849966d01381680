//! Snapshot report returned to the admin statistics endpoint

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregates for one sliding partition (last minute, last five minutes)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub requests: u64,
    pub errors: u64,
    pub avg_response_ms: f64,
    pub p95_response_ms: f64,
}

/// Whole-window totals plus heartbeat presence counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub requests_15m: u64,
    pub active_users_15m: u64,
    pub active_users_1m: u64,
    pub online_clients_1m: u64,
    pub online_users_1m: u64,
    /// Request count keyed by HTTP status; keys serialize as JSON strings
    pub by_status_15m: BTreeMap<u16, u64>,
}

/// Point-in-time aggregation of the metrics window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub totals: Totals,
    pub last_1m: WindowStats,
    pub last_5m: WindowStats,
    /// Unix seconds at which the snapshot was computed
    pub generated_at: i64,
}

impl MetricsReport {
    /// Error ratio over the last minute, 0 when idle
    pub fn error_rate_1m(&self) -> f64 {
        if self.last_1m.requests == 0 {
            return 0.0;
        }
        self.last_1m.errors as f64 / self.last_1m.requests as f64
    }

    /// Same report with `generated_at` cleared, for comparing two snapshots
    pub fn without_timestamp(&self) -> Self {
        Self {
            generated_at: 0,
            ..self.clone()
        }
    }
}
