//! Prometheus exposition of request metrics
//!
//! Cumulative counterparts of the sliding window: every event the interceptor
//! feeds into the [`MetricsCollector`](crate::metrics::MetricsCollector) is
//! mirrored here so external scrapers see monotonic counters.

use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Prometheus registry and metric handles for the service
#[derive(Clone)]
pub struct PrometheusMetrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// HTTP traffic metrics
    http_metrics: HttpMetrics,

    /// Window and presence gauges
    window_metrics: WindowMetrics,
}

/// HTTP traffic metrics
#[derive(Clone)]
pub struct HttpMetrics {
    /// Completed requests by status code
    pub requests_total: IntCounterVec,

    /// Request handling time
    pub request_duration_seconds: Histogram,

    /// Heartbeats accepted
    pub heartbeats_total: IntCounter,
}

/// Gauges refreshed from the sliding window
#[derive(Clone)]
pub struct WindowMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Request events currently held in the window
    pub window_requests: IntGauge,

    /// Distinct heartbeat clients currently tracked
    pub tracked_clients: IntGauge,
}

impl PrometheusMetrics {
    /// Create metrics with a fresh registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create metrics registered on a custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let http_metrics = HttpMetrics::new(&registry)?;
        let window_metrics = WindowMetrics::new(&registry)?;

        Ok(Self {
            registry,
            http_metrics,
            window_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn http(&self) -> &HttpMetrics {
        &self.http_metrics
    }

    pub fn window(&self) -> &WindowMetrics {
        &self.window_metrics
    }

    /// Record a completed request
    pub fn record_request(&self, status_code: u16, duration: Duration) {
        let status = status_code.to_string();
        self.http_metrics
            .requests_total
            .with_label_values(&[status.as_str()])
            .inc();

        self.http_metrics
            .request_duration_seconds
            .observe(duration.as_secs_f64());
    }

    /// Record an accepted heartbeat
    pub fn record_heartbeat(&self) {
        self.http_metrics.heartbeats_total.inc();
    }

    /// Refresh the window gauges
    pub fn update_window(&self, window_requests: usize, tracked_clients: usize) {
        self.window_metrics
            .window_requests
            .set(window_requests as i64);
        self.window_metrics
            .tracked_clients
            .set(tracked_clients as i64);
    }

    pub fn update_uptime(&self, uptime: Duration) {
        self.window_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }

    /// Render all metric families in the text exposition format
    pub fn encode_text(&self) -> Result<String> {
        let metric_families = self.registry.gather();
        TextEncoder::new()
            .encode_to_string(&metric_families)
            .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))
    }

    /// Content type of [`encode_text`](Self::encode_text) output
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    /// Create a timer for measuring request duration
    pub fn start_timer(&self) -> RequestTimer {
        RequestTimer::new()
    }
}

/// Timer for measuring request durations
pub struct RequestTimer {
    start: Instant,
}

impl RequestTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl HttpMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let requests_total = IntCounterVec::new(
            Opts::new(
                "project_tracker_http_requests_total",
                "Total HTTP requests completed",
            ),
            &["status"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "project_tracker_http_request_duration_seconds",
                "HTTP request handling time",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        let heartbeats_total = IntCounter::new(
            "project_tracker_heartbeats_total",
            "Total client heartbeats accepted",
        )?;
        registry.register(Box::new(heartbeats_total.clone()))?;

        Ok(Self {
            requests_total,
            request_duration_seconds,
            heartbeats_total,
        })
    }
}

impl WindowMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("project_tracker_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let window_requests = IntGauge::new(
            "project_tracker_window_requests",
            "Request events held in the metrics window",
        )?;
        registry.register(Box::new(window_requests.clone()))?;

        let tracked_clients = IntGauge::new(
            "project_tracker_tracked_clients",
            "Distinct heartbeat clients tracked",
        )?;
        registry.register(Box::new(tracked_clients.clone()))?;

        Ok(Self {
            uptime_seconds,
            window_requests,
            tracked_clients,
        })
    }
}
