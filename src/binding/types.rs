use serde::{Deserialize, Serialize};

use crate::error::{Result, WindowError};
use crate::persist::PersistConfig;

pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Where a binding reads from and writes back to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BindingSource {
    /// Another key of the same instance's state.
    State { key: String },
    /// A registered setting; `namespace` is required to resolve it.
    Setting {
        key: String,
        #[serde(default)]
        namespace: Option<String>,
    },
    /// A document flag; `namespace` and `document_id` are required.
    Flag {
        key: String,
        #[serde(default)]
        namespace: Option<String>,
        #[serde(default, rename = "documentId")]
        document_id: Option<String>,
    },
    /// Journal-backed data; not wired to any backend yet.
    Journal {
        key: String,
        #[serde(default, rename = "documentId")]
        document_id: Option<String>,
    },
}

impl BindingSource {
    pub fn key(&self) -> &str {
        match self {
            BindingSource::State { key }
            | BindingSource::Setting { key, .. }
            | BindingSource::Flag { key, .. }
            | BindingSource::Journal { key, .. } => key,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BindingSource::State { .. } => "state",
            BindingSource::Setting { .. } => "setting",
            BindingSource::Flag { .. } => "flag",
            BindingSource::Journal { .. } => "journal",
        }
    }

    /// Persist address for `setting` and `flag` sources.
    pub fn to_persist_config(&self) -> Result<PersistConfig> {
        match self {
            BindingSource::Setting { key, namespace } => {
                let namespace = namespace.as_deref().filter(|ns| !ns.is_empty()).ok_or_else(
                    || WindowError::InvalidBindingSource("Setting binding requires namespace".into()),
                )?;
                Ok(PersistConfig::setting(namespace, key.clone()))
            }
            BindingSource::Flag {
                key,
                namespace,
                document_id,
            } => match (
                namespace.as_deref().filter(|ns| !ns.is_empty()),
                document_id.as_deref().filter(|id| !id.is_empty()),
            ) {
                (Some(namespace), Some(document_id)) => {
                    Ok(PersistConfig::flag(namespace, document_id, key.clone()))
                }
                _ => Err(WindowError::InvalidBindingSource(
                    "Flag binding requires namespace and documentId".into(),
                )),
            },
            other => Err(WindowError::InvalidBindingSource(format!(
                "Cannot convert {} to PersistConfig",
                other.kind()
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingTarget {
    #[serde(rename = "stateKey")]
    pub state_key: String,
}

impl BindingTarget {
    pub fn state_key(key: impl Into<String>) -> Self {
        Self {
            state_key: key.into(),
        }
    }
}

/// When a two-way binding writes state back to its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPolicy {
    None,
    Debounced,
    Immediate,
    /// Only synced by explicit calls; treated as `None` during `sync`.
    Manual,
}

impl SyncPolicy {
    /// `Manual` collapses to `None`.
    pub fn effective(self) -> SyncPolicy {
        match self {
            SyncPolicy::Manual => SyncPolicy::None,
            other => other,
        }
    }
}

/// Binding as declared on a control or on the window definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingDescriptor {
    #[serde(default)]
    pub id: Option<String>,
    pub source: BindingSource,
    pub target: BindingTarget,
    #[serde(default, rename = "twoWay")]
    pub two_way: bool,
    #[serde(default, rename = "syncPolicy")]
    pub sync_policy: Option<SyncPolicy>,
    #[serde(default, rename = "debounceMs")]
    pub debounce_ms: Option<u64>,
}

impl BindingDescriptor {
    pub fn new(source: BindingSource, state_key: impl Into<String>) -> Self {
        Self {
            id: None,
            source,
            target: BindingTarget::state_key(state_key),
            two_way: false,
            sync_policy: None,
            debounce_ms: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn two_way(mut self) -> Self {
        self.two_way = true;
        self
    }

    pub fn with_policy(mut self, policy: SyncPolicy) -> Self {
        self.sync_policy = Some(policy);
        self
    }

    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = Some(debounce_ms);
        self
    }
}

/// Binding after normalization; source and target are fixed from here on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedBinding {
    id: String,
    source: BindingSource,
    target: BindingTarget,
    pub two_way: bool,
    pub sync_policy: Option<SyncPolicy>,
    pub debounce_ms: u64,
    pub is_local: bool,
}

impl NormalizedBinding {
    pub(crate) fn from_descriptor(
        descriptor: &BindingDescriptor,
        fallback_id: String,
        is_local: bool,
        default_debounce_ms: u64,
    ) -> Self {
        Self {
            id: descriptor.id.clone().unwrap_or(fallback_id),
            source: descriptor.source.clone(),
            target: descriptor.target.clone(),
            two_way: descriptor.two_way,
            sync_policy: descriptor.sync_policy,
            debounce_ms: descriptor.debounce_ms.unwrap_or(default_debounce_ms),
            is_local,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &BindingSource {
        &self.source
    }

    pub fn target(&self) -> &BindingTarget {
        &self.target
    }

    /// Binding policy if set (manual → none), otherwise the call's policy.
    pub fn effective_policy(&self, call_policy: SyncPolicy) -> SyncPolicy {
        self.sync_policy
            .map(SyncPolicy::effective)
            .unwrap_or(call_policy)
            .effective()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptors_parse_from_declarative_json() {
        let descriptor: BindingDescriptor = serde_json::from_value(json!({
            "source": {"type": "setting", "key": "value", "namespace": "test"},
            "target": {"stateKey": "count"},
            "twoWay": true
        }))
        .unwrap();
        assert!(descriptor.two_way);
        assert_eq!(descriptor.source.key(), "value");
        assert_eq!(descriptor.target.state_key, "count");
        assert_eq!(descriptor.sync_policy, None);
    }

    #[test]
    fn persist_config_requires_addressing() {
        let source = BindingSource::Setting {
            key: "value".into(),
            namespace: None,
        };
        assert_eq!(
            source.to_persist_config().unwrap_err().code(),
            "InvalidBindingSource"
        );

        let source = BindingSource::Flag {
            key: "hidden".into(),
            namespace: Some("mod".into()),
            document_id: None,
        };
        assert_eq!(
            source.to_persist_config().unwrap_err().to_string(),
            "Flag binding requires namespace and documentId"
        );

        let source = BindingSource::Setting {
            key: "value".into(),
            namespace: Some("test".into()),
        };
        assert_eq!(
            source.to_persist_config().unwrap(),
            PersistConfig::setting("test", "value")
        );
    }

    #[test]
    fn binding_policy_overrides_call_policy() {
        let descriptor = BindingDescriptor::new(BindingSource::State { key: "a".into() }, "b");
        let binding = NormalizedBinding::from_descriptor(&descriptor, "b-binding".into(), false, 300);
        assert_eq!(binding.effective_policy(SyncPolicy::Debounced), SyncPolicy::Debounced);
        assert_eq!(binding.debounce_ms, 300);

        let manual = NormalizedBinding::from_descriptor(
            &descriptor.clone().with_policy(SyncPolicy::Manual),
            "b-binding".into(),
            false,
            300,
        );
        assert_eq!(manual.effective_policy(SyncPolicy::Immediate), SyncPolicy::None);
    }
}
