use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::registry::WindowDefinition;
use crate::render::HostElement;

use super::controller::WindowController;

/// Host-side application wrapping one window.
///
/// Implementations forward the host's render, re-render and close callbacks
/// to [`WindowController::on_render`], [`WindowController::on_update`] and
/// [`WindowController::on_close`].
#[async_trait]
pub trait HostApplication: Send + Sync {
    fn instance_id(&self) -> &str;

    fn is_visible(&self) -> bool;

    async fn show(&self) -> Result<()>;

    async fn hide(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Builds the host application for a freshly created controller.
pub trait ApplicationAdapter: Send + Sync {
    fn build_application(
        &self,
        definition: &WindowDefinition,
        controller: Arc<WindowController>,
    ) -> Result<Arc<dyn HostApplication>>;
}

/// Application for hosts without a window manager; renders into a fixed
/// element.
pub struct HeadlessApplication {
    controller: Arc<WindowController>,
    element: Arc<dyn HostElement>,
    visible: AtomicBool,
}

impl HeadlessApplication {
    pub fn new(controller: Arc<WindowController>, element: Arc<dyn HostElement>) -> Self {
        Self {
            controller,
            element,
            visible: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl HostApplication for HeadlessApplication {
    fn instance_id(&self) -> &str {
        self.controller.instance_id()
    }

    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    async fn show(&self) -> Result<()> {
        if self.controller.is_mounted() {
            self.controller.on_update(self.element.as_ref()).await?;
        } else {
            self.controller.on_render(self.element.as_ref()).await?;
        }
        self.visible.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn hide(&self) -> Result<()> {
        self.visible.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.visible.store(false, Ordering::SeqCst);
        self.controller.on_close().await
    }
}

/// Adapter producing [`HeadlessApplication`]s that share one host element.
#[derive(Clone)]
pub struct HeadlessApplicationAdapter {
    element: Arc<dyn HostElement>,
}

impl HeadlessApplicationAdapter {
    pub fn new(element: Arc<dyn HostElement>) -> Self {
        Self { element }
    }
}

impl ApplicationAdapter for HeadlessApplicationAdapter {
    fn build_application(
        &self,
        _definition: &WindowDefinition,
        controller: Arc<WindowController>,
    ) -> Result<Arc<dyn HostApplication>> {
        Ok(Arc::new(HeadlessApplication::new(
            controller,
            self.element.clone(),
        )))
    }
}
