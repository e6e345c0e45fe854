use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::logging::{LogLevel, Logger, SYNC_TARGET, emit, json_kv};
use crate::persist::{ChangeNotification, ChangeTarget, PersistTarget};
use crate::registry::{DependencyDescriptor, WindowDefinition, WindowRegistry};

use super::gate::RemoteSyncGate;

/// Applies host change notifications to the windows that depend on them.
///
/// A window never receives the echo of its own write; other windows of the
/// same client still do.
pub struct RemoteChangeRouter {
    registry: Arc<WindowRegistry>,
    gate: Arc<RemoteSyncGate>,
    logger: Option<Logger>,
}

impl RemoteChangeRouter {
    pub fn new(registry: Arc<WindowRegistry>, gate: Arc<RemoteSyncGate>) -> Self {
        Self {
            registry,
            gate,
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Routes one notification; returns the ids of the windows patched.
    pub async fn handle(&self, notification: &ChangeNotification) -> Vec<String> {
        let mut patched = Vec::new();
        for instance in self.registry.list_instances() {
            let Some(controller) = instance.controller else {
                continue;
            };
            if self
                .gate
                .is_from_window(notification.options.as_ref(), &instance.instance_id)
            {
                continue;
            }
            if !is_relevant(controller.definition(), &notification.target) {
                continue;
            }
            match controller.apply_remote_patch(&notification.changes).await {
                Ok(()) => patched.push(instance.instance_id),
                Err(err) => emit(
                    self.logger.as_ref(),
                    LogLevel::Warn,
                    SYNC_TARGET,
                    "remote patch failed",
                    [
                        json_kv("instance_id", instance.instance_id.as_str()),
                        json_kv("error", err.to_string()),
                    ],
                ),
            }
        }
        patched
    }

    /// Routes every notification received on `changes` until the sender is
    /// dropped. Must be called from within a tokio runtime.
    pub fn spawn(self: Arc<Self>, mut changes: broadcast::Receiver<ChangeNotification>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(notification) => {
                        self.handle(&notification).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => emit(
                        self.logger.as_ref(),
                        LogLevel::Warn,
                        SYNC_TARGET,
                        "change notifications dropped",
                        [json_kv("skipped", skipped)],
                    ),
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Whether a change to `target` concerns windows of `definition`.
pub fn is_relevant(definition: &WindowDefinition, target: &ChangeTarget) -> bool {
    let persisted = definition
        .persist
        .as_ref()
        .is_some_and(|config| match (&config.target, target) {
            (
                PersistTarget::Flag { document_id, .. },
                ChangeTarget::Document {
                    document_id: changed,
                },
            ) => document_id == changed,
            (
                PersistTarget::Setting { namespace, key },
                ChangeTarget::Setting {
                    namespace: changed_ns,
                    key: changed_key,
                },
            ) => namespace == changed_ns && key == changed_key,
            _ => false,
        });

    persisted
        || definition
            .dependencies
            .iter()
            .any(|dependency| match (dependency, target) {
                (
                    DependencyDescriptor::Document { document_id },
                    ChangeTarget::Document {
                        document_id: changed,
                    },
                ) => document_id == changed,
                (
                    DependencyDescriptor::Setting { namespace, key },
                    ChangeTarget::Setting {
                        namespace: changed_ns,
                        key: changed_key,
                    },
                ) => namespace == changed_ns && key == changed_key,
                _ => false,
            })
}
