use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Key under which origin metadata travels inside host update options.
pub const ORIGIN_META_KEY: &str = "windowFrameworkOrigin";

/// External storage location addressed by a persist config.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PersistTarget {
    /// Client or world setting registered under `namespace.key`.
    Setting { namespace: String, key: String },
    /// Flag stored on a host document under `flags.namespace.key`.
    Flag {
        namespace: String,
        #[serde(rename = "documentId")]
        document_id: String,
        key: String,
    },
}

impl PersistTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            PersistTarget::Setting { .. } => "setting",
            PersistTarget::Flag { .. } => "flag",
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            PersistTarget::Setting { namespace, .. } | PersistTarget::Flag { namespace, .. } => {
                namespace
            }
        }
    }

    pub fn key(&self) -> &str {
        match self {
            PersistTarget::Setting { key, .. } | PersistTarget::Flag { key, .. } => key,
        }
    }

    pub fn document_id(&self) -> Option<&str> {
        match self {
            PersistTarget::Setting { .. } => None,
            PersistTarget::Flag { document_id, .. } => Some(document_id),
        }
    }

    /// Stable address string, e.g. `setting:ns.key` or `flag:Actor.1:ns.key`.
    pub fn address(&self) -> String {
        match self {
            PersistTarget::Setting { namespace, key } => format!("setting:{namespace}.{key}"),
            PersistTarget::Flag {
                namespace,
                document_id,
                key,
            } => format!("flag:{document_id}:{namespace}.{key}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistConfig {
    #[serde(flatten)]
    pub target: PersistTarget,
    #[serde(default, rename = "restoreOnOpen")]
    pub restore_on_open: bool,
}

impl PersistConfig {
    pub fn setting(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            target: PersistTarget::Setting {
                namespace: namespace.into(),
                key: key.into(),
            },
            restore_on_open: false,
        }
    }

    pub fn flag(
        namespace: impl Into<String>,
        document_id: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            target: PersistTarget::Flag {
                namespace: namespace.into(),
                document_id: document_id.into(),
                key: key.into(),
            },
            restore_on_open: false,
        }
    }

    pub fn restore_on_open(mut self, restore: bool) -> Self {
        self.restore_on_open = restore;
        self
    }
}

/// Origin tag attached to every outgoing write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistMeta {
    pub origin_client_id: String,
    pub origin_window_instance_id: String,
    pub render: bool,
}

impl PersistMeta {
    /// Host update options carrying this meta: `{render, windowFrameworkOrigin}`.
    pub fn to_options(&self) -> Value {
        json!({
            "render": self.render,
            ORIGIN_META_KEY: self,
        })
    }
}

/// Pulls a well-formed [`PersistMeta`] out of host update options.
pub fn extract_persist_meta(options: Option<&Value>) -> Option<PersistMeta> {
    let meta = options?.get(ORIGIN_META_KEY)?;
    serde_json::from_value(meta.clone()).ok()
}
