use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::PersistError;
use crate::state::StateMap;

use super::types::{PersistConfig, PersistMeta, PersistTarget};

pub type PersistResult<T> = std::result::Result<T, PersistError>;

/// Asynchronous storage backend for window state and binding payloads.
#[async_trait]
pub trait PersistAdapter: Send + Sync {
    async fn save(
        &self,
        config: &PersistConfig,
        data: &StateMap,
        meta: Option<&PersistMeta>,
    ) -> PersistResult<()>;

    async fn load(&self, config: &PersistConfig) -> PersistResult<StateMap>;
}

/// What a host change notification refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeTarget {
    Setting { namespace: String, key: String },
    Document { document_id: String },
}

/// Change notification as the host's document/setting hooks deliver it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotification {
    pub target: ChangeTarget,
    pub changes: StateMap,
    /// Update options; carries origin metadata when a window wrote the change.
    pub options: Option<Value>,
}

/// One recorded `save` call.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedWrite {
    pub config: PersistConfig,
    pub data: StateMap,
    pub meta: Option<PersistMeta>,
}

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Process-local persist adapter holding settings and document flags.
///
/// Every successful save is published as a [`ChangeNotification`], mirroring
/// the host firing its change hooks after a write.
pub struct MemoryPersistAdapter {
    entries: RwLock<HashMap<String, StateMap>>,
    writes: Mutex<Vec<SavedWrite>>,
    changes: broadcast::Sender<ChangeNotification>,
}

impl Default for MemoryPersistAdapter {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
            changes: broadcast::channel(CHANGE_CHANNEL_CAPACITY).0,
        }
    }
}

impl MemoryPersistAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds stored data without recording a write or publishing a change.
    pub fn insert(&self, config: &PersistConfig, data: StateMap) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(config.target.address(), data);
    }

    pub fn stored(&self, config: &PersistConfig) -> Option<StateMap> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&config.target.address())
            .cloned()
    }

    pub fn writes(&self) -> Vec<SavedWrite> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.changes.subscribe()
    }

    fn validate(config: &PersistConfig) -> PersistResult<()> {
        match &config.target {
            PersistTarget::Setting { namespace, key } => {
                if namespace.is_empty() || key.is_empty() {
                    return Err(PersistError::InvalidConfig(
                        "Setting config requires namespace and key".to_string(),
                    ));
                }
            }
            PersistTarget::Flag {
                namespace,
                document_id,
                key,
            } => {
                if namespace.is_empty() || document_id.is_empty() || key.is_empty() {
                    return Err(PersistError::InvalidConfig(
                        "Flag config requires documentId, namespace, and key".to_string(),
                    ));
                }
                if document_id.split('.').next().unwrap_or_default().is_empty() {
                    return Err(PersistError::InvalidConfig(
                        "Invalid document ID format".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn change_target(target: &PersistTarget) -> ChangeTarget {
        match target {
            PersistTarget::Setting { namespace, key } => ChangeTarget::Setting {
                namespace: namespace.clone(),
                key: key.clone(),
            },
            PersistTarget::Flag { document_id, .. } => ChangeTarget::Document {
                document_id: document_id.clone(),
            },
        }
    }
}

#[async_trait]
impl PersistAdapter for MemoryPersistAdapter {
    async fn save(
        &self,
        config: &PersistConfig,
        data: &StateMap,
        meta: Option<&PersistMeta>,
    ) -> PersistResult<()> {
        Self::validate(config)?;
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(config.target.address(), data.clone());
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SavedWrite {
                config: config.clone(),
                data: data.clone(),
                meta: meta.cloned(),
            });

        // nobody listening is fine
        let _ = self.changes.send(ChangeNotification {
            target: Self::change_target(&config.target),
            changes: data.clone(),
            options: meta.map(PersistMeta::to_options),
        });
        Ok(())
    }

    async fn load(&self, config: &PersistConfig) -> PersistResult<StateMap> {
        Self::validate(config)?;
        Ok(self.stored(config).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> StateMap {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn save_then_load_returns_payload() {
        let adapter = MemoryPersistAdapter::new();
        let config = PersistConfig::setting("test-namespace", "test-key");
        adapter
            .save(&config, &data(json!({"value": "test"})), None)
            .await
            .unwrap();

        let loaded = adapter.load(&config).await.unwrap();
        assert_eq!(loaded, data(json!({"value": "test"})));
        assert_eq!(adapter.writes().len(), 1);
    }

    #[tokio::test]
    async fn load_of_unknown_address_is_empty() {
        let adapter = MemoryPersistAdapter::new();
        let loaded = adapter
            .load(&PersistConfig::flag("mod", "Actor.1", "hidden"))
            .await
            .unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn invalid_configs_are_rejected() {
        let adapter = MemoryPersistAdapter::new();
        let err = adapter
            .save(&PersistConfig::setting("", "key"), &StateMap::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "InvalidConfig");
        assert_eq!(err.to_string(), "Setting config requires namespace and key");

        let err = adapter
            .load(&PersistConfig::flag("mod", ".1", "hidden"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid document ID format");
    }

    #[tokio::test]
    async fn saves_publish_change_notifications_with_origin() {
        let adapter = MemoryPersistAdapter::new();
        let mut changes = adapter.subscribe();
        let meta = PersistMeta {
            origin_client_id: "client-1".into(),
            origin_window_instance_id: "w1".into(),
            render: false,
        };
        adapter
            .save(
                &PersistConfig::flag("mod", "Actor.1", "hidden"),
                &data(json!({"hidden": true})),
                Some(&meta),
            )
            .await
            .unwrap();

        let change = changes.recv().await.unwrap();
        assert_eq!(
            change.target,
            ChangeTarget::Document {
                document_id: "Actor.1".into()
            }
        );
        assert_eq!(change.options, Some(meta.to_options()));
    }
}
