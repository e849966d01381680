//! Integration tests for the project-tracker monitoring service
//!
//! These tests drive the full router in-process and validate:
//! - Request interception and per-caller counting
//! - Client heartbeats and online presence
//! - Admin gating of the metrics snapshot
//! - Window aging on a manual clock
//! - Prometheus exposition

mod fixtures;

use axum::http::StatusCode;
use fixtures::{get, heartbeat, mint_token, TestService};
use project_tracker::config::AppConfig;
use project_tracker::metrics::MetricsReport;
use tower::ServiceExt;

const ADMIN_METRICS: &str = "/api/admin/metrics";

/// Fetch the snapshot as an admin and decode it
async fn admin_snapshot(service: &TestService) -> MetricsReport {
    let token = mint_token(99, Some("admin"));
    let (status, body) = service.send(get(ADMIN_METRICS, Some(&token))).await;
    assert_eq!(status, StatusCode::OK, "snapshot failed: {}", body);
    serde_json::from_value(body).expect("Snapshot body does not match the report shape")
}

#[tokio::test]
async fn test_requests_are_counted_per_caller() {
    let service = TestService::new();
    let alice = mint_token(1, Some("student"));
    let bob = mint_token(2, None);

    service.send(get("/", Some(&alice))).await;
    service.send(get("/", Some(&alice))).await;
    service.send(get("/", Some(&bob))).await;
    service.send(get("/", None)).await;
    let (status, body) = service.send(get("/missing", Some(&bob))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");

    let report = admin_snapshot(&service).await;
    assert_eq!(report.totals.requests_15m, 5);
    assert_eq!(report.totals.active_users_15m, 2);
    assert_eq!(report.totals.active_users_1m, 2);
    assert_eq!(report.totals.by_status_15m.get(&200), Some(&4));
    assert_eq!(report.totals.by_status_15m.get(&404), Some(&1));
    assert_eq!(report.last_1m.errors, 0);

    // The first snapshot request is now part of the window
    let report = admin_snapshot(&service).await;
    assert_eq!(report.totals.requests_15m, 6);
    assert_eq!(report.totals.active_users_15m, 3);
}

#[tokio::test]
async fn test_stats_endpoint_gating() {
    let service = TestService::new();

    let (status, body) = service.send(get(ADMIN_METRICS, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = service.send(get(ADMIN_METRICS, Some("not-a-jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let student = mint_token(7, Some("student"));
    let (status, _) = service.send(get(ADMIN_METRICS, Some(&student))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = mint_token(1, Some("admin"));
    let (status, body) = service.send(get(ADMIN_METRICS, Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totals"]["requests_15m"], 3);
    assert_eq!(body["totals"]["by_status_15m"]["401"], 2);
    assert_eq!(body["totals"]["by_status_15m"]["403"], 1);
}

#[tokio::test]
async fn test_stats_open_when_gating_disabled() {
    let mut config = AppConfig::default();
    config.auth.require_admin_for_stats = false;
    let service = TestService::with_config(config);

    let (status, body) = service.send(get(ADMIN_METRICS, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totals"]["requests_15m"], 0);
}

#[tokio::test]
async fn test_snapshot_json_shape() {
    let service = TestService::new();
    let admin = mint_token(1, Some("admin"));

    let (_, body) = service.send(get(ADMIN_METRICS, Some(&admin))).await;

    for key in [
        "requests_15m",
        "active_users_15m",
        "active_users_1m",
        "online_clients_1m",
        "online_users_1m",
        "by_status_15m",
    ] {
        assert!(body["totals"].get(key).is_some(), "missing totals.{}", key);
    }
    for window in ["last_1m", "last_5m"] {
        for key in ["requests", "errors", "avg_response_ms", "p95_response_ms"] {
            assert!(body[window].get(key).is_some(), "missing {}.{}", window, key);
        }
    }
    assert_eq!(
        body["generated_at"],
        service.state.collector().snapshot().unwrap().generated_at
    );
}

#[tokio::test]
async fn test_heartbeat_presence_over_time() {
    let service = TestService::new();
    let carol = mint_token(5, None);

    for client in ["tab-a", "tab-b"] {
        let (status, body) = service.send(heartbeat(client, Some(&carol))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }
    service.send(heartbeat("tab-c", None)).await;

    let report = admin_snapshot(&service).await;
    assert_eq!(report.totals.online_clients_1m, 3);
    assert_eq!(report.totals.online_users_1m, 1);
    assert_eq!(report.totals.active_users_1m, 1);

    // Past the online window, still inside the minute
    service.advance_secs(21);
    let report = admin_snapshot(&service).await;
    assert_eq!(report.totals.online_clients_1m, 0);
    assert_eq!(report.totals.online_users_1m, 0);
    assert_eq!(report.totals.active_users_1m, 2);

    // A fresh heartbeat brings one tab back
    service.send(heartbeat("tab-a", Some(&carol))).await;
    let report = admin_snapshot(&service).await;
    assert_eq!(report.totals.online_clients_1m, 1);
    assert_eq!(report.totals.online_users_1m, 1);
}

#[tokio::test]
async fn test_heartbeat_with_missing_client_id() {
    let service = TestService::new();

    let (status, body) = service.send(heartbeat("   ", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    assert_eq!(service.state.collector().tracked_clients(), 0);
    // The heartbeat request itself is still a request
    assert_eq!(service.state.collector().len(), 1);
}

#[tokio::test]
async fn test_window_aging() {
    let service = TestService::new();

    for _ in 0..3 {
        service.send(get("/", None)).await;
    }
    service.advance_secs(120);
    for _ in 0..2 {
        service.send(get("/", None)).await;
    }

    let report = admin_snapshot(&service).await;
    assert_eq!(report.last_1m.requests, 2);
    assert_eq!(report.last_5m.requests, 5);
    assert_eq!(report.totals.requests_15m, 5);

    service.advance_secs(901);
    let report = admin_snapshot(&service).await;
    assert_eq!(report.totals.requests_15m, 0);
    assert_eq!(report.last_5m.requests, 0);
    assert!(report.totals.by_status_15m.is_empty());
}

#[tokio::test]
async fn test_server_errors_counted() {
    let service = TestService::new();
    let collector = service.state.collector();

    collector.record_request(500, 12.0, Some(3));
    collector.record_request(503, 30.0, None);
    collector.record_request(499, 5.0, None);

    let report = admin_snapshot(&service).await;
    assert_eq!(report.last_1m.requests, 3);
    assert_eq!(report.last_1m.errors, 2);
    assert!((report.error_rate_1m() - 2.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_prometheus_mirrors_requests() {
    let service = TestService::new();
    service.send(get("/", None)).await;
    service.send(get("/missing", None)).await;
    service.send(heartbeat("tab-a", None)).await;

    let response = service
        .router
        .clone()
        .oneshot(get("/metrics", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("project_tracker_http_requests_total{status=\"200\"} 2"));
    assert!(text.contains("project_tracker_http_requests_total{status=\"404\"} 1"));
    assert!(text.contains("project_tracker_heartbeats_total 1"));
}

#[tokio::test]
async fn test_health_reflects_lifecycle() {
    let service = TestService::new();

    let (status, body) = service.send(get("/health", None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");

    service.state.mark_running().await;
    let (status, body) = service.send(get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    service.state.shutdown().await.unwrap();
    assert!(!service.state.is_running().await);
}
