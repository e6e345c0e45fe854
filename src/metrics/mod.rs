use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Shared handle handed to every service that records metrics.
pub type SharedMetrics = Arc<Mutex<WindowMetrics>>;

#[derive(Debug, Default, Clone)]
pub struct WindowMetrics {
    mounts: u64,
    closes: u64,
    state_updates: u64,
    remote_patches: u64,
    dispatches: u64,
    dispatch_failures: u64,
    binding_saves: u64,
    debounced_flushes: u64,
}

impl WindowMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedMetrics {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn record_mount(&mut self) {
        self.mounts = self.mounts.saturating_add(1);
    }

    pub fn record_close(&mut self) {
        self.closes = self.closes.saturating_add(1);
    }

    pub fn record_state_update(&mut self, keys: usize) {
        self.state_updates = self.state_updates.saturating_add(keys as u64);
    }

    pub fn record_remote_patch(&mut self) {
        self.remote_patches = self.remote_patches.saturating_add(1);
    }

    pub fn record_dispatch(&mut self, succeeded: bool) {
        self.dispatches = self.dispatches.saturating_add(1);
        if !succeeded {
            self.dispatch_failures = self.dispatch_failures.saturating_add(1);
        }
    }

    pub fn record_binding_save(&mut self, debounced: bool) {
        self.binding_saves = self.binding_saves.saturating_add(1);
        if debounced {
            self.debounced_flushes = self.debounced_flushes.saturating_add(1);
        }
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            mounts: self.mounts,
            closes: self.closes,
            state_updates: self.state_updates,
            remote_patches: self.remote_patches,
            dispatches: self.dispatches,
            dispatch_failures: self.dispatch_failures,
            binding_saves: self.binding_saves,
            debounced_flushes: self.debounced_flushes,
        }
    }
}

/// Runs `record` against an optional shared metrics handle.
pub(crate) fn record(metrics: Option<&SharedMetrics>, record: impl FnOnce(&mut WindowMetrics)) {
    if let Some(metrics) = metrics {
        record(&mut metrics.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub mounts: u64,
    pub closes: u64,
    pub state_updates: u64,
    pub remote_patches: u64,
    pub dispatches: u64,
    pub dispatch_failures: u64,
    pub binding_saves: u64,
    pub debounced_flushes: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(LogLevel::Info, target, "window_metrics", self.as_fields())
    }

    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        map.insert("mounts".to_string(), json!(self.mounts));
        map.insert("closes".to_string(), json!(self.closes));
        map.insert("state_updates".to_string(), json!(self.state_updates));
        map.insert("remote_patches".to_string(), json!(self.remote_patches));
        map.insert("dispatches".to_string(), json!(self.dispatches));
        map.insert(
            "dispatch_failures".to_string(),
            json!(self.dispatch_failures),
        );
        map.insert("binding_saves".to_string(), json!(self.binding_saves));
        map.insert(
            "debounced_flushes".to_string(),
            json!(self.debounced_flushes),
        );
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let mut metrics = WindowMetrics::new();
        metrics.record_mount();
        metrics.record_dispatch(true);
        metrics.record_dispatch(false);
        metrics.record_binding_save(true);
        metrics.record_binding_save(false);
        metrics.record_state_update(3);

        let snapshot = metrics.snapshot(Duration::from_millis(1500));
        assert_eq!(snapshot.uptime_ms, 1500);
        assert_eq!(snapshot.mounts, 1);
        assert_eq!(snapshot.dispatches, 2);
        assert_eq!(snapshot.dispatch_failures, 1);
        assert_eq!(snapshot.binding_saves, 2);
        assert_eq!(snapshot.debounced_flushes, 1);
        assert_eq!(snapshot.state_updates, 3);
    }

    #[test]
    fn snapshot_renders_as_log_event() {
        let shared = WindowMetrics::shared();
        record(Some(&shared), |m| m.record_close());
        let snapshot = shared.lock().unwrap().snapshot(Duration::ZERO);
        let event = snapshot.to_log_event("window::metrics");
        assert_eq!(event.message, "window_metrics");
        assert_eq!(event.field("closes"), Some(&json!(1)));
    }
}
