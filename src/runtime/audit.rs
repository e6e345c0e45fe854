//! Window lifecycle audit hooks.
//!
//! Controllers report each lifecycle transition as a [`WindowAuditEvent`] so
//! hosts can log, buffer or inspect the progression of a window without
//! hooking into the controller itself.

use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use serde_json::Value;

/// Lifecycle checkpoints reported by `WindowController`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAuditStage {
    /// Factory finished building and registering the window.
    Created,
    /// Component mounted and listeners attached.
    Mounted,
    /// Render requested while already mounted.
    RenderSkipped,
    /// Local state update applied.
    StateUpdated,
    /// Remote change applied without persisting.
    RemotePatchApplied,
    /// State written through the persist adapter.
    Persisted,
    /// State restored from the persist adapter.
    Restored,
    /// Window closed and unmounted.
    Closed,
    /// Bindings and state released.
    Disposed,
}

#[derive(Debug, Clone)]
pub struct WindowAuditEvent {
    pub timestamp: SystemTime,
    pub stage: WindowAuditStage,
    pub instance_id: String,
    pub details: Vec<(String, Value)>,
}

pub struct WindowAuditEventBuilder {
    event: WindowAuditEvent,
}

impl WindowAuditEventBuilder {
    pub fn new(stage: WindowAuditStage, instance_id: impl Into<String>) -> Self {
        Self {
            event: WindowAuditEvent {
                timestamp: SystemTime::now(),
                stage,
                instance_id: instance_id.into(),
                details: Vec::new(),
            },
        }
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.event.details.push((key.into(), value.into()));
        self
    }

    pub fn finish(self) -> WindowAuditEvent {
        self.event
    }
}

pub trait WindowAudit: Send + Sync {
    fn record(&self, event: WindowAuditEvent);
}

/// Default sink; discards everything.
#[derive(Debug, Default)]
pub struct NullWindowAudit;

impl WindowAudit for NullWindowAudit {
    fn record(&self, _event: WindowAuditEvent) {}
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct BufferedWindowAudit {
    events: Mutex<Vec<WindowAuditEvent>>,
}

impl BufferedWindowAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<WindowAuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn stages(&self, instance_id: &str) -> Vec<WindowAuditStage> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| event.instance_id == instance_id)
            .map(|event| event.stage)
            .collect()
    }
}

impl WindowAudit for BufferedWindowAudit {
    fn record(&self, event: WindowAuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
