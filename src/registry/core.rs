use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{Result, WindowError};

use super::definition::{WindowDefinition, WindowInstance};

/// Registry of window definitions and the live instances built from them.
#[derive(Default)]
pub struct WindowRegistry {
    definitions: RwLock<HashMap<String, Arc<WindowDefinition>>>,
    instances: RwLock<HashMap<String, WindowInstance>>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_definition(&self, definition: WindowDefinition) -> Result<()> {
        use std::collections::hash_map::Entry;

        let mut definitions = self
            .definitions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match definitions.entry(definition.definition_id.clone()) {
            Entry::Occupied(entry) => Err(WindowError::DefinitionAlreadyExists(entry.key().clone())),
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(definition));
                Ok(())
            }
        }
    }

    pub fn get_definition(&self, definition_id: &str) -> Result<Arc<WindowDefinition>> {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(definition_id)
            .cloned()
            .ok_or_else(|| WindowError::DefinitionNotFound(definition_id.to_string()))
    }

    pub fn has_definition(&self, definition_id: &str) -> bool {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(definition_id)
    }

    pub fn register_instance(&self, instance: WindowInstance) -> Result<()> {
        use std::collections::hash_map::Entry;

        let mut instances = self
            .instances
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match instances.entry(instance.instance_id.clone()) {
            Entry::Occupied(entry) => Err(WindowError::InstanceAlreadyExists(entry.key().clone())),
            Entry::Vacant(vacant) => {
                vacant.insert(instance);
                Ok(())
            }
        }
    }

    pub fn get_instance(&self, instance_id: &str) -> Result<WindowInstance> {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(instance_id)
            .cloned()
            .ok_or_else(|| WindowError::InstanceNotFound(instance_id.to_string()))
    }

    pub fn unregister_instance(&self, instance_id: &str) -> Result<WindowInstance> {
        self.instances
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(instance_id)
            .ok_or_else(|| WindowError::InstanceNotFound(instance_id.to_string()))
    }

    /// All live instances, ordered by instance id.
    pub fn list_instances(&self) -> Vec<WindowInstance> {
        let mut instances: Vec<_> = self
            .instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        instances.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        instances
    }

    pub fn list_instances_by_definition(&self, definition_id: &str) -> Vec<WindowInstance> {
        self.list_instances()
            .into_iter()
            .filter(|instance| instance.definition_id == definition_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ComponentDescriptor;

    fn definition(id: &str) -> WindowDefinition {
        WindowDefinition::new(id, "Test Window", ComponentDescriptor::new("panel"))
    }

    #[test]
    fn definitions_register_once() {
        let registry = WindowRegistry::new();
        registry.register_definition(definition("test-window")).unwrap();

        let err = registry
            .register_definition(definition("test-window"))
            .unwrap_err();
        assert_eq!(err.code(), "DefinitionAlreadyExists");
        assert_eq!(
            registry.get_definition("test-window").unwrap().title,
            "Test Window"
        );
    }

    #[test]
    fn unknown_definition_is_reported() {
        let registry = WindowRegistry::new();
        let err = registry.get_definition("missing").unwrap_err();
        assert_eq!(err.code(), "DefinitionNotFound");
    }

    #[test]
    fn instances_register_and_unregister() {
        let registry = WindowRegistry::new();
        registry
            .register_instance(WindowInstance::new("w:1", "w"))
            .unwrap();
        let err = registry
            .register_instance(WindowInstance::new("w:1", "w"))
            .unwrap_err();
        assert_eq!(err.code(), "InstanceAlreadyExists");

        assert_eq!(registry.get_instance("w:1").unwrap().definition_id, "w");
        registry.unregister_instance("w:1").unwrap();
        assert_eq!(
            registry.get_instance("w:1").unwrap_err().code(),
            "InstanceNotFound"
        );
        assert_eq!(
            registry.unregister_instance("w:1").unwrap_err().code(),
            "InstanceNotFound"
        );
    }

    #[test]
    fn instances_list_by_definition() {
        let registry = WindowRegistry::new();
        registry
            .register_instance(WindowInstance::new("a:2", "a"))
            .unwrap();
        registry
            .register_instance(WindowInstance::new("b:1", "b"))
            .unwrap();
        registry
            .register_instance(WindowInstance::new("a:1", "a"))
            .unwrap();

        let ids: Vec<_> = registry
            .list_instances_by_definition("a")
            .into_iter()
            .map(|instance| instance.instance_id)
            .collect();
        assert_eq!(ids, vec!["a:1".to_string(), "a:2".to_string()]);
        assert_eq!(registry.list_instances().len(), 3);
    }
}
