//! Sliding-window request metrics
//!
//! This module keeps the last few minutes of request outcomes and client
//! heartbeats in memory and aggregates them on demand into a
//! [`MetricsReport`]. Every write and every read evicts expired entries, so
//! memory stays proportional to recent traffic.

use crate::config::MetricsSettings;
use crate::error::MonitorError;
use crate::metrics::clock::{Clock, SystemClock};
use crate::metrics::report::{MetricsReport, Totals, WindowStats};
use crate::types::{CallerId, ClientId, HeartbeatRecord, RequestEvent};
use crate::utils::{clamp_duration_ms, mean, percentile, window_start};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// Short partition reported as `last_1m`
const LAST_MINUTE: Duration = Duration::from_secs(60);

/// Medium partition reported as `last_5m`
const LAST_FIVE_MINUTES: Duration = Duration::from_secs(300);

const P95: f64 = 0.95;

/// Window sizes and bounds for the collector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Events and heartbeats older than this are evicted
    pub retention_window: Duration,
    /// Heartbeats younger than this count as "online"
    pub online_window: Duration,
    /// Upper bound on distinct heartbeat client ids
    pub max_tracked_clients: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            retention_window: Duration::from_secs(900), // 15 minutes
            online_window: Duration::from_secs(20),
            max_tracked_clients: 10_000,
        }
    }
}

impl From<&MetricsSettings> for CollectorConfig {
    fn from(settings: &MetricsSettings) -> Self {
        Self {
            retention_window: Duration::from_secs(settings.retention_window_seconds),
            online_window: Duration::from_secs(settings.online_window_seconds),
            max_tracked_clients: settings.max_tracked_clients,
        }
    }
}

#[derive(Debug, Default)]
struct WindowState {
    requests: VecDeque<RequestEvent>,
    heartbeats: HashMap<ClientId, HeartbeatRecord>,
    /// Heartbeat clients ordered by `last_seen`, kept in step with `heartbeats`
    heartbeat_order: BTreeSet<(DateTime<Utc>, ClientId)>,
}

impl WindowState {
    /// Pop expired events from the front; returns how many were dropped
    fn purge_requests(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.requests.len();
        while self
            .requests
            .front()
            .is_some_and(|event| event.timestamp < cutoff)
        {
            self.requests.pop_front();
        }
        before - self.requests.len()
    }

    /// Insert or refresh a client; a stored beat later than `record` is kept
    fn upsert_heartbeat(&mut self, client_id: &str, record: HeartbeatRecord) {
        if let Some(existing) = self.heartbeats.get_mut(client_id) {
            // A racing writer may already have stored a later beat
            if existing.last_seen > record.last_seen {
                return;
            }
            self.heartbeat_order
                .remove(&(existing.last_seen, client_id.to_string()));
            *existing = record;
        } else {
            self.heartbeats.insert(client_id.to_string(), record);
        }
        self.heartbeat_order
            .insert((record.last_seen, client_id.to_string()));
    }

    /// Drop heartbeats older than `cutoff`, oldest first
    fn purge_heartbeats(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut purged = 0;
        while self
            .heartbeat_order
            .first()
            .is_some_and(|(last_seen, _)| *last_seen < cutoff)
        {
            if let Some((_, client_id)) = self.heartbeat_order.pop_first() {
                self.heartbeats.remove(&client_id);
                purged += 1;
            }
        }
        purged
    }

    fn evict_oldest_heartbeat(&mut self) -> Option<ClientId> {
        let (_, oldest) = self.heartbeat_order.pop_first()?;
        self.heartbeats.remove(&oldest);
        Some(oldest)
    }
}

/// Process-wide collector of request outcomes and client presence
pub struct MetricsCollector {
    config: CollectorConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<WindowState>,
}

impl MetricsCollector {
    /// Create a collector driven by the wall clock
    pub fn new(config: CollectorConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a collector with a custom time source
    pub fn with_clock(config: CollectorConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(WindowState::default()),
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Record one completed request. Never fails toward the caller.
    pub fn record_request(&self, status_code: u16, duration_ms: f64, caller_id: Option<CallerId>) {
        if let Err(e) = self.try_record_request(status_code, duration_ms, caller_id) {
            warn!(
                "Dropping request metrics event (status {}): {}",
                status_code, e
            );
        }
    }

    /// Record a heartbeat from a client. Empty client ids are ignored.
    pub fn record_heartbeat(&self, client_id: &str, caller_id: Option<CallerId>) {
        let client_id = client_id.trim();
        if client_id.is_empty() {
            debug!("Ignoring heartbeat without client id");
            return;
        }

        if let Err(e) = self.try_record_heartbeat(client_id, caller_id) {
            warn!("Dropping heartbeat from client '{}': {}", client_id, e);
        }
    }

    /// Aggregate the current window into a report
    pub fn snapshot(&self) -> Result<MetricsReport, MonitorError> {
        let now = self.clock.now();
        let retention_start = window_start(now, self.config.retention_window);
        let online_start = window_start(now, self.config.online_window);

        // Copy under the lock, aggregate outside it
        let (events, online) = {
            let mut state = self.lock_state()?;
            state.purge_requests(retention_start);
            state.purge_heartbeats(retention_start);

            let events: Vec<RequestEvent> = state
                .requests
                .iter()
                .filter(|event| event.timestamp >= retention_start)
                .cloned()
                .collect();
            let online: Vec<Option<CallerId>> = state
                .heartbeats
                .values()
                .filter(|record| record.last_seen >= online_start)
                .map(|record| record.caller_id)
                .collect();

            (events, online)
        };

        let minute_start = window_start(now, LAST_MINUTE);
        let five_minute_start = window_start(now, LAST_FIVE_MINUTES);

        let all: Vec<&RequestEvent> = events.iter().collect();
        let last_1m: Vec<&RequestEvent> = events
            .iter()
            .filter(|event| event.timestamp >= minute_start)
            .collect();
        let last_5m: Vec<&RequestEvent> = events
            .iter()
            .filter(|event| event.timestamp >= five_minute_start)
            .collect();

        let mut by_status: BTreeMap<u16, u64> = BTreeMap::new();
        for event in &all {
            *by_status.entry(event.status_code).or_insert(0) += 1;
        }

        let totals = Totals {
            requests_15m: all.len() as u64,
            active_users_15m: distinct_callers(all.iter().map(|event| event.caller_id)),
            active_users_1m: distinct_callers(last_1m.iter().map(|event| event.caller_id)),
            online_clients_1m: online.len() as u64,
            online_users_1m: distinct_callers(online.iter().copied()),
            by_status_15m: by_status,
        };

        Ok(MetricsReport {
            totals,
            last_1m: summarize(&last_1m),
            last_5m: summarize(&last_5m),
            generated_at: now.timestamp(),
        })
    }

    /// Evict expired events and heartbeats; returns (events, heartbeats) removed
    pub fn purge(&self) -> Result<(usize, usize), MonitorError> {
        let cutoff = window_start(self.clock.now(), self.config.retention_window);
        let mut state = self.lock_state()?;
        Ok((state.purge_requests(cutoff), state.purge_heartbeats(cutoff)))
    }

    /// Number of request events currently held
    pub fn len(&self) -> usize {
        self.read_state().requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct heartbeat clients currently held
    pub fn tracked_clients(&self) -> usize {
        self.read_state().heartbeats.len()
    }

    fn try_record_request(
        &self,
        status_code: u16,
        duration_ms: f64,
        caller_id: Option<CallerId>,
    ) -> Result<(), MonitorError> {
        let now = self.clock.now();
        let event = RequestEvent {
            timestamp: now,
            status_code,
            duration_ms: clamp_duration_ms(duration_ms),
            caller_id,
        };
        let cutoff = window_start(now, self.config.retention_window);

        let mut state = self.lock_state()?;
        state.requests.push_back(event);
        state.purge_requests(cutoff);
        Ok(())
    }

    fn try_record_heartbeat(
        &self,
        client_id: &str,
        caller_id: Option<CallerId>,
    ) -> Result<(), MonitorError> {
        let now = self.clock.now();
        let record = HeartbeatRecord {
            last_seen: now,
            caller_id,
        };

        let mut state = self.lock_state()?;

        let is_new = !state.heartbeats.contains_key(client_id);
        if is_new && state.heartbeats.len() >= self.config.max_tracked_clients {
            let cutoff = window_start(now, self.config.retention_window);
            state.purge_heartbeats(cutoff);

            while state.heartbeats.len() >= self.config.max_tracked_clients {
                match state.evict_oldest_heartbeat() {
                    Some(evicted) => {
                        debug!("Heartbeat table full, evicted client '{}'", evicted)
                    }
                    None => break,
                }
            }
        }

        if self.config.max_tracked_clients > 0 {
            state.upsert_heartbeat(client_id, record);
        }
        Ok(())
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, WindowState>, MonitorError> {
        self.state.lock().map_err(|_| MonitorError::Internal {
            message: "Failed to acquire metrics window lock".to_string(),
        })
    }

    /// Lock for size reads; sizes stay meaningful after a writer panicked
    fn read_state(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Metrics window lock poisoned, reading sizes anyway");
            PoisonError::into_inner(poisoned)
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(CollectorConfig::default())
    }
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("config", &self.config)
            .field("events", &self.len())
            .field("tracked_clients", &self.tracked_clients())
            .finish()
    }
}

fn summarize(events: &[&RequestEvent]) -> WindowStats {
    if events.is_empty() {
        return WindowStats::default();
    }

    let mut durations: Vec<f64> = events.iter().map(|event| event.duration_ms).collect();
    durations.sort_by(|a, b| a.total_cmp(b));

    WindowStats {
        requests: events.len() as u64,
        errors: events.iter().filter(|event| event.is_error()).count() as u64,
        avg_response_ms: mean(&durations),
        p95_response_ms: percentile(&durations, P95),
    }
}

fn distinct_callers(callers: impl Iterator<Item = Option<CallerId>>) -> u64 {
    callers.flatten().collect::<HashSet<_>>().len() as u64
}
