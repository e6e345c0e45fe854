use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::{Result, WindowError};
use crate::registry::ComponentDescriptor;

use super::view::{ComponentInstance, MountPoint, ViewModel};

/// Rendering engine for one component type.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn mount(
        &self,
        component: &ComponentDescriptor,
        target: &MountPoint,
        view_model: &ViewModel,
    ) -> Result<ComponentInstance>;

    async fn unmount(&self, instance: &ComponentInstance) -> Result<()>;

    async fn update(&self, instance: &ComponentInstance, view_model: &ViewModel) -> Result<()>;
}

/// Renderers keyed by the component type they handle.
#[derive(Default)]
pub struct RendererRegistry {
    renderers: RwLock<HashMap<String, Arc<dyn Renderer>>>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `renderer`, replacing any renderer for the same type.
    pub fn register(&self, kind: impl Into<String>, renderer: Arc<dyn Renderer>) {
        self.renderers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind.into(), renderer);
    }

    pub fn get(&self, kind: &str) -> Result<Arc<dyn Renderer>> {
        self.renderers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind)
            .cloned()
            .ok_or_else(|| WindowError::RendererNotFound(kind.to_string()))
    }

    pub fn has(&self, kind: &str) -> bool {
        self.renderers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(kind)
    }
}

/// Routes mount/unmount/update calls to the renderer of a component type.
#[derive(Clone)]
pub struct RendererCoordinator {
    registry: Arc<RendererRegistry>,
}

impl RendererCoordinator {
    pub fn new(registry: Arc<RendererRegistry>) -> Self {
        Self { registry }
    }

    pub async fn mount(
        &self,
        component: &ComponentDescriptor,
        target: &MountPoint,
        view_model: &ViewModel,
    ) -> Result<ComponentInstance> {
        let renderer = self.registry.get(&component.kind)?;
        renderer
            .mount(component, target, view_model)
            .await
            .map_err(|err| WindowError::MountFailed(format!("Failed to mount component: {err}")))
    }

    pub async fn unmount(
        &self,
        component: &ComponentDescriptor,
        instance: &ComponentInstance,
    ) -> Result<()> {
        let renderer = self.registry.get(&component.kind)?;
        renderer.unmount(instance).await.map_err(|err| {
            WindowError::UnmountFailed(format!("Failed to unmount component: {err}"))
        })
    }

    pub async fn update(
        &self,
        component: &ComponentDescriptor,
        instance: &ComponentInstance,
        view_model: &ViewModel,
    ) -> Result<()> {
        let renderer = self.registry.get(&component.kind)?;
        renderer.update(instance, view_model).await.map_err(|err| {
            WindowError::UpdateFailed(format!("Failed to update component: {err}"))
        })
    }
}
