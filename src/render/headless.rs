use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::Result;
use crate::registry::ComponentDescriptor;
use crate::state::StateMap;

use super::core::Renderer;
use super::view::{ComponentInstance, MountPoint, ViewModel};

/// Renderer that draws nothing and remembers what it was asked to show.
#[derive(Default)]
pub struct HeadlessRenderer {
    next_id: AtomicU64,
    mounted: Mutex<Vec<String>>,
    frames: Mutex<Vec<StateMap>>,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of components currently mounted, in mount order.
    pub fn mounted(&self) -> Vec<String> {
        self.mounted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// State snapshots pushed by mounts and updates.
    pub fn frames(&self) -> Vec<StateMap> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn capture(&self, view_model: &ViewModel) {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(view_model.state.get());
    }
}

#[async_trait]
impl Renderer for HeadlessRenderer {
    async fn mount(
        &self,
        component: &ComponentDescriptor,
        target: &MountPoint,
        view_model: &ViewModel,
    ) -> Result<ComponentInstance> {
        let id = format!(
            "{}#{}",
            view_model.state.instance_id(),
            self.next_id.fetch_add(1, Ordering::Relaxed)
        );
        self.mounted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id.clone());
        self.capture(view_model);
        Ok(ComponentInstance {
            id,
            kind: component.kind.clone(),
            mount_point: target.clone(),
            props: component.props.clone(),
        })
    }

    async fn unmount(&self, instance: &ComponentInstance) -> Result<()> {
        self.mounted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|id| id != &instance.id);
        Ok(())
    }

    async fn update(&self, _instance: &ComponentInstance, view_model: &ViewModel) -> Result<()> {
        self.capture(view_model);
        Ok(())
    }
}
