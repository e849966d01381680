//! Test fixtures for integration testing
//!
//! Builds a complete service state on a manual clock with the real JWT
//! resolver, plus helpers to mint tokens and drive the router in-process.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use project_tracker::config::AppConfig;
use project_tracker::metrics::ManualClock;
use project_tracker::service::{build_router, AppState};
use project_tracker::JwtCallerResolver;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Secret shared by the fixture resolver and [`mint_token`]
pub const TEST_SECRET: &str = "integration-test-secret";

/// A service wired for tests: state, its clock and a router over it
pub struct TestService {
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
    pub router: Router,
}

impl TestService {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(mut config: AppConfig) -> Self {
        config.auth.jwt_secret = TEST_SECRET.to_string();

        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let resolver = Arc::new(JwtCallerResolver::new(TEST_SECRET));
        let state = Arc::new(
            AppState::with_components(config, clock.clone(), resolver)
                .expect("Failed to build test state"),
        );
        let router = build_router(state.clone());

        Self {
            state,
            clock,
            router,
        }
    }

    /// Send a request and decode the JSON body (Null for non-JSON bodies)
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router call failed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    /// Advance the collector clock
    pub fn advance_secs(&self, seconds: u64) {
        self.clock.advance(Duration::from_secs(seconds));
    }
}

impl Default for TestService {
    fn default() -> Self {
        Self::new()
    }
}

/// Sign an access token for `user_id`
pub fn mint_token(user_id: i64, role: Option<&str>) -> String {
    let mut claims = json!({ "sub": user_id.to_string() });
    if let Some(role) = role {
        claims["role"] = json!(role);
    }

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("Failed to sign token")
}

/// Build a GET request with an optional bearer token
pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).expect("Invalid request")
}

/// Build a heartbeat request for `client_id`
pub fn heartbeat(client_id: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/monitor/heartbeat")
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder
        .body(Body::from(json!({ "client_id": client_id }).to_string()))
        .expect("Invalid request")
}
