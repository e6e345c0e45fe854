use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::actions::ActionDefinition;
use crate::binding::BindingDescriptor;
use crate::persist::PersistConfig;
use crate::runtime::{HostApplication, WindowController};

/// Component a window mounts, resolved to a renderer by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub props: Value,
}

impl ComponentDescriptor {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            props: Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Local binding; normalized with `is_local = true`.
    #[serde(default)]
    pub binding: Option<BindingDescriptor>,
    /// Action dispatched when the control fires.
    #[serde(default)]
    pub action: Option<String>,
}

impl ControlDescriptor {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            label: None,
            binding: None,
            action: None,
        }
    }

    pub fn with_binding(mut self, binding: BindingDescriptor) -> Self {
        self.binding = Some(binding);
        self
    }

    pub fn with_action(mut self, action_id: impl Into<String>) -> Self {
        self.action = Some(action_id.into());
        self
    }
}

/// Host data a window depends on; used to route remote change notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DependencyDescriptor {
    Document {
        #[serde(rename = "documentId")]
        document_id: String,
    },
    Setting {
        namespace: String,
        key: String,
    },
}

/// Declarative description of a window kind.
#[derive(Debug, Clone)]
pub struct WindowDefinition {
    pub definition_id: String,
    pub title: String,
    pub component: ComponentDescriptor,
    pub controls: Vec<ControlDescriptor>,
    pub bindings: Vec<BindingDescriptor>,
    pub actions: Vec<ActionDefinition>,
    pub persist: Option<PersistConfig>,
    pub dependencies: Vec<DependencyDescriptor>,
}

impl WindowDefinition {
    pub fn new(
        definition_id: impl Into<String>,
        title: impl Into<String>,
        component: ComponentDescriptor,
    ) -> Self {
        Self {
            definition_id: definition_id.into(),
            title: title.into(),
            component,
            controls: Vec::new(),
            bindings: Vec::new(),
            actions: Vec::new(),
            persist: None,
            dependencies: Vec::new(),
        }
    }

    pub fn with_control(mut self, control: ControlDescriptor) -> Self {
        self.controls.push(control);
        self
    }

    pub fn with_binding(mut self, binding: BindingDescriptor) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn with_action(mut self, action: ActionDefinition) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_persist(mut self, persist: PersistConfig) -> Self {
        self.persist = Some(persist);
        self
    }

    pub fn with_dependency(mut self, dependency: DependencyDescriptor) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn action(&self, action_id: &str) -> Option<&ActionDefinition> {
        self.actions.iter().find(|action| action.id == action_id)
    }
}

/// Per-window adjustments applied on top of a registered definition.
#[derive(Debug, Clone, Default)]
pub struct WindowOverrides {
    pub title: Option<String>,
    pub persist: Option<PersistConfig>,
    pub props: Option<Value>,
}

impl WindowOverrides {
    pub fn apply(self, mut definition: WindowDefinition) -> WindowDefinition {
        if let Some(title) = self.title {
            definition.title = title;
        }
        if let Some(persist) = self.persist {
            definition.persist = Some(persist);
        }
        if let Some(props) = self.props {
            definition.component.props = props;
        }
        definition
    }
}

/// Live window owned by the registry.
#[derive(Clone)]
pub struct WindowInstance {
    pub instance_id: String,
    pub definition_id: String,
    pub controller: Option<Arc<WindowController>>,
    pub app: Option<Arc<dyn HostApplication>>,
}

impl WindowInstance {
    pub fn new(instance_id: impl Into<String>, definition_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            definition_id: definition_id.into(),
            controller: None,
            app: None,
        }
    }

    pub fn with_controller(mut self, controller: Arc<WindowController>) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn with_app(mut self, app: Arc<dyn HostApplication>) -> Self {
        self.app = Some(app);
        self
    }
}

impl fmt::Debug for WindowInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowInstance")
            .field("instance_id", &self.instance_id)
            .field("definition_id", &self.definition_id)
            .field("controller", &self.controller.is_some())
            .field("app", &self.app.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overrides_replace_title_persist_and_props() {
        let definition = WindowDefinition::new("sheet", "Sheet", ComponentDescriptor::new("panel"));
        let updated = WindowOverrides {
            title: Some("Custom".into()),
            persist: Some(PersistConfig::setting("mod", "sheet")),
            props: Some(json!({"compact": true})),
        }
        .apply(definition);

        assert_eq!(updated.title, "Custom");
        assert_eq!(updated.persist, Some(PersistConfig::setting("mod", "sheet")));
        assert_eq!(updated.component.props, json!({"compact": true}));
    }

    #[test]
    fn controls_parse_with_local_bindings() {
        let control: ControlDescriptor = serde_json::from_value(json!({
            "id": "volume",
            "type": "slider",
            "binding": {
                "source": {"type": "state", "key": "volume"},
                "target": {"stateKey": "volume"}
            }
        }))
        .unwrap();
        assert_eq!(control.kind, "slider");
        assert!(control.binding.is_some());

        let dependency: DependencyDescriptor =
            serde_json::from_value(json!({"type": "document", "documentId": "Actor.1"})).unwrap();
        assert_eq!(
            dependency,
            DependencyDescriptor::Document {
                document_id: "Actor.1".into()
            }
        );
    }
}
