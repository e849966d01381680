//! Error types for the monitoring service
//!
//! Application-level code propagates with anyhow; the HTTP boundary and the
//! collector use the typed [`MonitorError`] so failures map onto status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific monitoring scenarios
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Missing or invalid credentials: {reason}")]
    Unauthorized { reason: String },

    #[error("Access denied: {reason}")]
    Forbidden { reason: String },

    #[error("Invalid token: {reason}")]
    InvalidToken { reason: String },

    #[error("Internal service error: {message}")]
    Internal { message: String },
}

impl MonitorError {
    /// HTTP status this error maps to at the API boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            MonitorError::Unauthorized { .. } | MonitorError::InvalidToken { .. } => {
                StatusCode::UNAUTHORIZED
            }
            MonitorError::Forbidden { .. } => StatusCode::FORBIDDEN,
            MonitorError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MonitorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal details stay in the logs
        let message = match &self {
            MonitorError::Internal { .. } => "Internal server error".to_string(),
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
