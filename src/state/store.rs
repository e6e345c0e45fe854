use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::error::{Result, WindowError};

/// Key/value state of one window instance.
pub type StateMap = Map<String, Value>;

struct InstanceState {
    values: StateMap,
    revision: u64,
}

/// In-memory state of every live window instance, keyed by instance id.
///
/// Writers never wait on each other for long: all operations are synchronous
/// and the lock is never held across an await point.
#[derive(Default)]
pub struct StateStore {
    instances: RwLock<HashMap<String, InstanceState>>,
    watchers: RwLock<HashMap<String, watch::Sender<u64>>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `value` under `key`, creating the instance entry on demand.
    pub fn set(&self, instance_id: &str, key: &str, value: Value) -> Result<()> {
        let revision = {
            let mut guard = self
                .instances
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let entry = guard
                .entry(instance_id.to_string())
                .or_insert_with(|| InstanceState {
                    values: StateMap::new(),
                    revision: 0,
                });
            entry.values.insert(key.to_string(), value);
            entry.revision += 1;
            entry.revision
        };
        self.notify(instance_id, revision);
        Ok(())
    }

    pub fn get(&self, instance_id: &str, key: &str) -> Result<Value> {
        let guard = self
            .instances
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = guard
            .get(instance_id)
            .ok_or_else(|| WindowError::InstanceNotFound(instance_id.to_string()))?;
        entry
            .values
            .get(key)
            .cloned()
            .ok_or_else(|| WindowError::KeyNotFound {
                instance_id: instance_id.to_string(),
                key: key.to_string(),
            })
    }

    /// Snapshot of an instance's state; unknown instances yield an empty map.
    pub fn get_all(&self, instance_id: &str) -> Result<StateMap> {
        let guard = self
            .instances
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(guard
            .get(instance_id)
            .map(|entry| entry.values.clone())
            .unwrap_or_default())
    }

    pub fn clear(&self, instance_id: &str) -> Result<()> {
        let removed = self
            .instances
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(instance_id);
        if let Some(entry) = removed {
            self.notify(instance_id, entry.revision + 1);
        }
        Ok(())
    }

    pub fn contains(&self, instance_id: &str) -> bool {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(instance_id)
    }

    pub fn instance_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Current write revision of an instance (0 when unknown).
    pub fn revision(&self, instance_id: &str) -> u64 {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(instance_id)
            .map(|entry| entry.revision)
            .unwrap_or(0)
    }

    /// Receiver that observes the revision of `instance_id` after each write.
    pub fn subscribe(&self, instance_id: &str) -> watch::Receiver<u64> {
        let current = self.revision(instance_id);
        let mut watchers = self
            .watchers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        watchers
            .entry(instance_id.to_string())
            .or_insert_with(|| watch::channel(current).0)
            .subscribe()
    }

    fn notify(&self, instance_id: &str, revision: u64) {
        let mut watchers = self
            .watchers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = watchers.get(instance_id) {
            if sender.send(revision).is_err() {
                // every receiver is gone
                watchers.remove(instance_id);
            }
        }
    }
}
