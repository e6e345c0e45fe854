use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::Result;
use crate::state::WindowState;

/// Resolved place in the host's element tree a component is mounted into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MountPoint {
    pub selector: String,
}

impl MountPoint {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

/// Root element handed to the controller by the host on render.
pub trait HostElement: Send + Sync {
    fn query(&self, selector: &str) -> Option<MountPoint>;
}

/// Host element exposing a fixed set of selectors.
#[derive(Debug, Clone, Default)]
pub struct StaticElement {
    selectors: HashSet<String>,
}

impl StaticElement {
    pub fn with_selector(selector: impl Into<String>) -> Self {
        let mut element = Self::default();
        element.selectors.insert(selector.into());
        element
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl HostElement for StaticElement {
    fn query(&self, selector: &str) -> Option<MountPoint> {
        self.selectors
            .contains(selector)
            .then(|| MountPoint::new(selector))
    }
}

/// A mounted component as reported by its renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentInstance {
    pub id: String,
    pub kind: String,
    pub mount_point: MountPoint,
    pub props: Value,
}

type ActionFn = dyn Fn(Option<Value>) -> BoxFuture<'static, Result<()>> + Send + Sync;

/// Action entry point exposed to the mounted component.
#[derive(Clone)]
pub struct BoundAction {
    invoke: Arc<ActionFn>,
}

impl BoundAction {
    pub fn new<F>(invoke: F) -> Self
    where
        F: Fn(Option<Value>) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        Self {
            invoke: Arc::new(invoke),
        }
    }

    pub fn invoke(&self, event: Option<Value>) -> BoxFuture<'static, Result<()>> {
        (self.invoke)(event)
    }
}

impl fmt::Debug for BoundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BoundAction")
    }
}

/// What a renderer binds the component to: reactive state plus actions.
#[derive(Clone)]
pub struct ViewModel {
    pub state: WindowState,
    pub actions: BTreeMap<String, BoundAction>,
}

impl ViewModel {
    pub fn new(state: WindowState) -> Self {
        Self {
            state,
            actions: BTreeMap::new(),
        }
    }

    pub fn action(&self, action_id: &str) -> Option<&BoundAction> {
        self.actions.get(action_id)
    }
}

impl fmt::Debug for ViewModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewModel")
            .field("instance_id", &self.state.instance_id())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}
