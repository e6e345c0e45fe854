use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::binding::DEFAULT_DEBOUNCE_MS;
use crate::logging::{FileSink, LogLevel, Logger, LoggingResult};
use crate::metrics::{SharedMetrics, WindowMetrics};

pub mod audit;
mod container;
mod controller;
mod factory;
mod host;
mod initializer;
mod persistence;
mod services;

pub use audit::{
    BufferedWindowAudit, NullWindowAudit, WindowAudit, WindowAuditEvent, WindowAuditEventBuilder,
    WindowAuditStage,
};
pub use container::{ContainerError, ServiceContainer};
pub use controller::{ControllerServices, ON_OPEN_ACTION, UpdateOptions, WindowController};
pub use factory::{WindowFactory, WindowHandle};
pub use host::{ApplicationAdapter, HeadlessApplication, HeadlessApplicationAdapter, HostApplication};
pub use initializer::{DefaultStateProvider, WindowStateInitializer};
pub use persistence::PersistenceCoordinator;
pub use services::{HostPorts, WindowServices};

/// Selector the controller mounts components into.
pub const DEFAULT_MOUNT_SELECTOR: &str = "#window-mount-point";

/// Framework-wide knobs shared by every window.
#[derive(Clone)]
pub struct FrameworkConfig {
    /// Debounce applied to bindings that do not set their own.
    pub default_debounce_ms: u64,
    /// Selector resolved against the host element on mount.
    pub mount_selector: String,
    /// Optional structured logger handed to every component.
    pub logger: Option<Logger>,
    /// Metrics accumulator; `None` disables collection.
    pub metrics: Option<SharedMetrics>,
    /// Target field used when emitting metrics snapshots.
    pub metrics_target: String,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            default_debounce_ms: DEFAULT_DEBOUNCE_MS,
            mount_selector: DEFAULT_MOUNT_SELECTOR.to_string(),
            logger: None,
            metrics: None,
            metrics_target: "window::metrics".to_string(),
        }
    }
}

impl FrameworkConfig {
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(WindowMetrics::shared());
        }
    }

    pub fn disable_metrics(&mut self) {
        self.metrics = None;
    }

    pub fn metrics_handle(&self) -> Option<SharedMetrics> {
        self.metrics.clone()
    }

    /// Writes one metrics snapshot through the logger. Returns `false` when
    /// either metrics or logging is off.
    pub fn emit_metrics_snapshot(&self, uptime: Duration) -> bool {
        let (Some(logger), Some(metrics)) = (&self.logger, &self.metrics) else {
            return false;
        };
        let snapshot = metrics
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .snapshot(uptime);
        logger
            .log_event(snapshot.to_log_event(&self.metrics_target))
            .is_ok()
    }
}

/// File form of [`FrameworkConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrameworkSettings {
    pub default_debounce_ms: u64,
    pub mount_selector: String,
    pub enable_metrics: bool,
    pub log_file: Option<PathBuf>,
    pub log_max_bytes: u64,
    pub log_level: Option<LogLevel>,
}

impl Default for FrameworkSettings {
    fn default() -> Self {
        Self {
            default_debounce_ms: DEFAULT_DEBOUNCE_MS,
            mount_selector: DEFAULT_MOUNT_SELECTOR.to_string(),
            enable_metrics: false,
            log_file: None,
            log_max_bytes: 1024 * 1024,
            log_level: None,
        }
    }
}

impl FrameworkSettings {
    pub fn from_json_str(input: &str) -> serde_json::Result<Self> {
        serde_json::from_str(input)
    }

    /// Builds the runtime config, opening the log file when one is named.
    pub fn into_config(self) -> LoggingResult<FrameworkConfig> {
        let mut config = FrameworkConfig {
            default_debounce_ms: self.default_debounce_ms,
            mount_selector: self.mount_selector,
            ..FrameworkConfig::default()
        };
        if let Some(path) = self.log_file {
            let mut logger = Logger::new(FileSink::new(path, self.log_max_bytes)?);
            if let Some(level) = self.log_level {
                logger = logger.with_min_level(level);
            }
            config.logger = Some(logger);
        }
        if self.enable_metrics {
            config.enable_metrics();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemorySink;

    #[test]
    fn defaults_match_framework_constants() {
        let config = FrameworkConfig::default();
        assert_eq!(config.default_debounce_ms, 300);
        assert_eq!(config.mount_selector, "#window-mount-point");
        assert!(config.metrics_handle().is_none());
    }

    #[test]
    fn enable_metrics_is_idempotent() {
        let mut config = FrameworkConfig::default();
        config.enable_metrics();
        let first = config.metrics_handle().unwrap();
        config.enable_metrics();
        assert!(std::sync::Arc::ptr_eq(&first, &config.metrics_handle().unwrap()));
        config.disable_metrics();
        assert!(config.metrics_handle().is_none());
    }

    #[test]
    fn metrics_snapshot_goes_to_logger() {
        let sink = MemorySink::new();
        let mut config = FrameworkConfig::default().with_logger(Logger::new(sink.clone()));
        assert!(!config.emit_metrics_snapshot(Duration::from_secs(1)));

        config.enable_metrics();
        config.metrics_handle().unwrap().lock().unwrap().record_mount();
        assert!(config.emit_metrics_snapshot(Duration::from_secs(1)));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].target, "window::metrics");
        assert_eq!(events[0].field("mounts"), Some(&serde_json::json!(1)));
    }

    #[test]
    fn settings_parse_with_defaults() {
        let settings =
            FrameworkSettings::from_json_str(r#"{"default_debounce_ms": 50, "enable_metrics": true}"#)
                .unwrap();
        assert_eq!(settings.mount_selector, DEFAULT_MOUNT_SELECTOR);

        let config = settings.into_config().unwrap();
        assert_eq!(config.default_debounce_ms, 50);
        assert!(config.metrics_handle().is_some());
        assert!(config.logger.is_none());
    }

    #[test]
    fn settings_reject_unknown_fields() {
        assert!(FrameworkSettings::from_json_str(r#"{"tick": 1}"#).is_err());
    }

    #[test]
    fn settings_open_log_file() {
        let path = std::env::temp_dir().join(format!("window-frame-{}.log", uuid::Uuid::new_v4()));
        let settings = FrameworkSettings {
            log_file: Some(path.clone()),
            log_level: Some(LogLevel::Warn),
            ..FrameworkSettings::default()
        };
        let config = settings.into_config().unwrap();
        let logger = config.logger.unwrap();
        logger.log(LogLevel::Info, "window::test", "dropped").unwrap();
        logger.log(LogLevel::Error, "window::test", "kept").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("kept"));
        assert!(!contents.contains("dropped"));
        let _ = std::fs::remove_file(path);
    }
}
