use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;

use super::store::{StateMap, StateStore};

/// Reactive state handle of one window instance.
///
/// The port is a view over the instance's [`StateStore`] entry, so values
/// hydrated by bindings and values patched by the UI are the same data.
/// Renderers observe changes through [`WindowState::subscribe`].
#[derive(Clone)]
pub struct WindowState {
    instance_id: String,
    store: Arc<StateStore>,
}

impl WindowState {
    pub fn new(instance_id: impl Into<String>, store: Arc<StateStore>) -> Self {
        Self {
            instance_id: instance_id.into(),
            store,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn get(&self) -> StateMap {
        self.store.get_all(&self.instance_id).unwrap_or_default()
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.store.get(&self.instance_id, key).ok()
    }

    /// Applies `updates`, skipping keys whose value is unchanged. Returns the
    /// keys that were written.
    pub fn patch(&self, updates: &StateMap) -> Vec<String> {
        let mut written = Vec::new();
        for (key, value) in updates {
            if self.value(key).as_ref() == Some(value) {
                continue;
            }
            // set() cannot fail
            let _ = self.store.set(&self.instance_id, key, value.clone());
            written.push(key.clone());
        }
        written
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.store.subscribe(&self.instance_id)
    }

    pub fn revision(&self) -> u64 {
        self.store.revision(&self.instance_id)
    }
}
