use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::registry::WindowDefinition;
use crate::state::{StateMap, WindowState};

/// Initial state for windows of one definition.
pub trait DefaultStateProvider: Send + Sync {
    fn default_state(&self, definition: &WindowDefinition) -> StateMap;
}

impl<F> DefaultStateProvider for F
where
    F: Fn(&WindowDefinition) -> StateMap + Send + Sync,
{
    fn default_state(&self, definition: &WindowDefinition) -> StateMap {
        self(definition)
    }
}

/// Default state providers keyed by definition id.
#[derive(Default)]
pub struct WindowStateInitializer {
    providers: RwLock<HashMap<String, Arc<dyn DefaultStateProvider>>>,
}

impl WindowStateInitializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, definition_id: impl Into<String>, provider: Arc<dyn DefaultStateProvider>) {
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(definition_id.into(), provider);
    }

    /// Defaults for `definition`; empty when no provider is registered.
    pub fn initial_state(&self, definition: &WindowDefinition) -> StateMap {
        let provider = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&definition.definition_id)
            .cloned();
        provider
            .map(|provider| provider.default_state(definition))
            .unwrap_or_default()
    }

    /// Writes defaults into `state` if the instance has no state yet.
    /// Returns the keys that were seeded.
    pub fn seed(&self, state: &WindowState, definition: &WindowDefinition) -> Vec<String> {
        if !state.get().is_empty() {
            return Vec::new();
        }
        state.patch(&self.initial_state(definition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ComponentDescriptor;
    use crate::state::StateStore;
    use serde_json::json;

    fn definition() -> WindowDefinition {
        WindowDefinition::new("overview", "Overview", ComponentDescriptor::new("panel"))
    }

    #[test]
    fn seeds_only_empty_instances() {
        let initializer = WindowStateInitializer::new();
        initializer.register(
            "overview",
            Arc::new(|_: &WindowDefinition| json!({"filter": "all"}).as_object().cloned().unwrap_or_default()),
        );
        let store = Arc::new(StateStore::new());
        let state = WindowState::new("overview:1", store.clone());

        assert_eq!(initializer.seed(&state, &definition()), vec!["filter".to_string()]);
        assert_eq!(state.value("filter"), Some(json!("all")));

        let other = WindowState::new("overview:2", store);
        other.patch(&json!({"filter": "mine"}).as_object().cloned().unwrap());
        assert!(initializer.seed(&other, &definition()).is_empty());
        assert_eq!(other.value("filter"), Some(json!("mine")));
    }

    #[test]
    fn unknown_definitions_have_no_defaults() {
        let initializer = WindowStateInitializer::new();
        assert!(initializer.initial_state(&definition()).is_empty());
    }
}
