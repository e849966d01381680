//! Common types used throughout the monitoring service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of an authenticated principal (user row id in the API database)
pub type CallerId = i64;

/// Client-supplied session identifier sent with heartbeats
pub type ClientId = String;

/// Role name that grants access to administrative endpoints
pub const ADMIN_ROLE: &str = "admin";

/// Authenticated principal behind a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: CallerId,
    pub role: Option<String>,
}

impl Caller {
    pub fn new(id: CallerId) -> Self {
        Self { id, role: None }
    }

    pub fn with_role(id: CallerId, role: impl Into<String>) -> Self {
        Self {
            id,
            role: Some(role.into()),
        }
    }

    /// Check whether this caller carries the admin role
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }
}

/// One completed HTTP request, as seen by the collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEvent {
    pub timestamp: DateTime<Utc>,
    pub status_code: u16,
    pub duration_ms: f64,
    pub caller_id: Option<CallerId>,
}

impl RequestEvent {
    /// Whether this request ended in a server-side error
    pub fn is_error(&self) -> bool {
        self.status_code >= 500
    }
}

/// Latest heartbeat received from one client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    pub last_seen: DateTime<Utc>,
    pub caller_id: Option<CallerId>,
}
