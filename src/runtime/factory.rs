use std::sync::Arc;

use crate::error::Result;
use crate::events::{EventBus, WindowEvent};
use crate::persist::PersistMeta;
use crate::registry::{WindowInstance, WindowOverrides, WindowRegistry};
use crate::state::StateMap;

use super::audit::{WindowAuditEventBuilder, WindowAuditStage};
use super::container::ServiceContainer;
use super::controller::{ControllerServices, UpdateOptions, WindowController};
use super::host::{ApplicationAdapter, HostApplication};

/// Builds window instances out of registered definitions.
#[derive(Clone)]
pub struct WindowFactory {
    container: ServiceContainer,
}

impl WindowFactory {
    pub fn new(container: ServiceContainer) -> Self {
        Self { container }
    }

    pub fn container(&self) -> &ServiceContainer {
        &self.container
    }

    /// Creates and registers a window.
    ///
    /// The instance id is `definition_id:instance_key`, or
    /// `definition_id:<uuid>` without a key. Fails with `DefinitionNotFound`
    /// for unknown definitions and `InstanceAlreadyExists` when the key is
    /// already taken.
    pub fn create_window(
        &self,
        definition_id: &str,
        instance_key: Option<&str>,
        overrides: Option<WindowOverrides>,
    ) -> Result<WindowHandle> {
        let registry = self.container.get::<WindowRegistry>()?;
        let applications = self.container.get::<dyn ApplicationAdapter>()?;
        let services = ControllerServices::resolve(&self.container)?;

        let base = registry.get_definition(definition_id)?;
        let definition = match overrides {
            Some(overrides) => overrides.apply((*base).clone()),
            None => (*base).clone(),
        };

        let instance_id = match instance_key {
            Some(key) => format!("{definition_id}:{key}"),
            None => format!("{definition_id}:{}", uuid::Uuid::new_v4()),
        };

        let events = services.events.clone();
        let audit = services.audit.clone();
        let controller = WindowController::new(instance_id.clone(), definition, services);
        let app = applications.build_application(controller.definition(), controller.clone())?;

        registry.register_instance(
            WindowInstance::new(instance_id.clone(), definition_id)
                .with_controller(controller.clone())
                .with_app(app.clone()),
        )?;

        events.emit(WindowEvent::WindowCreated {
            instance_id: instance_id.clone(),
            definition_id: definition_id.to_string(),
        });
        audit.record(
            WindowAuditEventBuilder::new(WindowAuditStage::Created, &instance_id)
                .detail("definition_id", definition_id)
                .finish(),
        );

        Ok(WindowHandle {
            controller,
            app,
            registry,
            events,
        })
    }
}

/// Caller-facing handle to one created window.
#[derive(Clone)]
pub struct WindowHandle {
    controller: Arc<WindowController>,
    app: Arc<dyn HostApplication>,
    registry: Arc<WindowRegistry>,
    events: EventBus,
}

impl WindowHandle {
    pub fn instance_id(&self) -> &str {
        self.controller.instance_id()
    }

    pub fn definition_id(&self) -> &str {
        self.controller.definition_id()
    }

    pub fn controller(&self) -> &Arc<WindowController> {
        &self.controller
    }

    pub fn app(&self) -> &Arc<dyn HostApplication> {
        &self.app
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub async fn show(&self) -> Result<()> {
        self.app.show().await
    }

    pub async fn hide(&self) -> Result<()> {
        self.app.hide().await
    }

    /// Closes the application, releases the controller and unregisters the
    /// instance.
    /// Closes the host application, then disposes and unregisters the
    /// window even when the host close failed. The first error is returned.
    pub async fn close(&self) -> Result<()> {
        let closed = self.app.close().await;
        self.controller.dispose();
        let unregistered = self.registry.unregister_instance(self.instance_id());
        closed?;
        unregistered?;
        Ok(())
    }

    /// Local update with default options: no persist, no sync.
    pub async fn update(&self, updates: &StateMap) -> Result<()> {
        self.controller
            .update_state_local(updates, UpdateOptions::default())
            .await
    }

    pub async fn persist(&self, meta: Option<PersistMeta>) -> Result<()> {
        self.controller.persist(meta).await
    }

    pub async fn restore(&self) -> Result<()> {
        self.controller.restore().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::registry::{ComponentDescriptor, WindowDefinition};
    use crate::render::{HeadlessRenderer, RendererRegistry, StaticElement};
    use crate::runtime::{FrameworkConfig, HeadlessApplicationAdapter, HostPorts, WindowServices};
    use crate::error::WindowError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Host whose close callback always fails.
    struct StuckApplication {
        controller: Arc<WindowController>,
    }

    #[async_trait]
    impl HostApplication for StuckApplication {
        fn instance_id(&self) -> &str {
            self.controller.instance_id()
        }

        fn is_visible(&self) -> bool {
            true
        }

        async fn show(&self) -> Result<()> {
            Ok(())
        }

        async fn hide(&self) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Err(WindowError::UnmountFailed("host refused to close".into()))
        }
    }

    struct StuckApplications;

    impl ApplicationAdapter for StuckApplications {
        fn build_application(
            &self,
            _definition: &WindowDefinition,
            controller: Arc<WindowController>,
        ) -> Result<Arc<dyn HostApplication>> {
            Ok(Arc::new(StuckApplication { controller }))
        }
    }

    const SELECTOR: &str = "#window-mount-point";

    fn factory() -> (WindowFactory, Arc<HeadlessRenderer>) {
        let element = Arc::new(StaticElement::with_selector(SELECTOR));
        factory_with(Arc::new(HeadlessApplicationAdapter::new(element)))
    }

    fn factory_with(applications: Arc<dyn ApplicationAdapter>) -> (WindowFactory, Arc<HeadlessRenderer>) {
        let container = ServiceContainer::new();
        WindowServices::install(&container, FrameworkConfig::default(), HostPorts::new(applications))
            .unwrap();
        let renderer = Arc::new(HeadlessRenderer::new());
        container
            .get::<RendererRegistry>()
            .unwrap()
            .register("panel", renderer.clone());
        container
            .get::<WindowRegistry>()
            .unwrap()
            .register_definition(WindowDefinition::new(
                "inventory",
                "Inventory",
                ComponentDescriptor::new("panel"),
            ))
            .unwrap();
        (WindowFactory::new(container), renderer)
    }

    #[test]
    fn instance_ids_use_key_or_uuid() {
        let (factory, _) = factory();
        let keyed = factory.create_window("inventory", Some("main"), None).unwrap();
        assert_eq!(keyed.instance_id(), "inventory:main");

        let generated = factory.create_window("inventory", None, None).unwrap();
        let suffix = generated.instance_id().strip_prefix("inventory:").unwrap();
        assert!(uuid::Uuid::parse_str(suffix).is_ok());
    }

    #[test]
    fn create_window_rejects_unknown_and_duplicate() {
        let (factory, _) = factory();
        let err = factory.create_window("missing", None, None).err().map(|e| e.code());
        assert_eq!(err, Some("DefinitionNotFound"));

        factory.create_window("inventory", Some("a"), None).unwrap();
        let err = factory.create_window("inventory", Some("a"), None).err().map(|e| e.code());
        assert_eq!(err, Some("InstanceAlreadyExists"));
    }

    #[test]
    fn create_window_emits_created_and_applies_overrides() {
        let (factory, _) = factory();
        let bus = factory.container().get::<EventBus>().unwrap();
        let created = Arc::new(Mutex::new(Vec::new()));
        let seen = created.clone();
        bus.on(EventKind::WindowCreated, move |event| {
            seen.lock().unwrap().push(event.instance_id().to_string());
        });

        let overrides = WindowOverrides {
            title: Some("Stash".into()),
            ..WindowOverrides::default()
        };
        let handle = factory.create_window("inventory", Some("x"), Some(overrides)).unwrap();

        assert_eq!(handle.controller().definition().title, "Stash");
        assert_eq!(*created.lock().unwrap(), vec!["inventory:x".to_string()]);
        let registry = factory.container().get::<WindowRegistry>().unwrap();
        assert_eq!(registry.get_definition("inventory").unwrap().title, "Inventory");
    }

    #[tokio::test]
    async fn handle_drives_the_window_lifecycle() {
        let (factory, renderer) = factory();
        let handle = factory.create_window("inventory", Some("main"), None).unwrap();

        handle.show().await.unwrap();
        assert!(handle.app().is_visible());
        assert_eq!(renderer.mounted().len(), 1);

        handle
            .update(json!({"gold": 5}).as_object().unwrap())
            .await
            .unwrap();
        assert_eq!(handle.controller().state()["gold"], json!(5));

        handle.hide().await.unwrap();
        assert!(!handle.app().is_visible());
        assert!(handle.controller().is_mounted());

        handle.close().await.unwrap();
        assert!(renderer.mounted().is_empty());
        let registry = factory.container().get::<WindowRegistry>().unwrap();
        assert!(registry.list_instances().is_empty());
        assert!(handle.controller().state().is_empty());
    }

    #[tokio::test]
    async fn failed_host_close_still_releases_the_window() {
        let (factory, _) = factory_with(Arc::new(StuckApplications));
        let handle = factory.create_window("inventory", Some("main"), None).unwrap();
        handle
            .update(json!({"gold": 1}).as_object().unwrap())
            .await
            .unwrap();

        let err = handle.close().await.unwrap_err();
        assert_eq!(err.code(), "UnmountFailed");

        let registry = factory.container().get::<WindowRegistry>().unwrap();
        assert!(registry.list_instances().is_empty());
        assert!(handle.controller().state().is_empty());
    }
}
