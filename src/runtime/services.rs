use std::sync::Arc;

use crate::actions::{ActionDispatcher, ConfirmationUi};
use crate::binding::BindingEngine;
use crate::error::Result;
use crate::events::EventBus;
use crate::persist::PersistAdapter;
use crate::registry::WindowRegistry;
use crate::render::{RendererCoordinator, RendererRegistry};
use crate::state::StateStore;
use crate::sync::{RemoteChangeRouter, RemoteSyncGate, SessionIdentity};

use super::FrameworkConfig;
use super::audit::{NullWindowAudit, WindowAudit};
use super::container::ServiceContainer;
use super::controller::ControllerServices;
use super::host::ApplicationAdapter;
use super::initializer::WindowStateInitializer;
use super::persistence::PersistenceCoordinator;

/// Host-provided ports the service graph is built around.
pub struct HostPorts {
    pub applications: Arc<dyn ApplicationAdapter>,
    pub persist: Option<Arc<dyn PersistAdapter>>,
    pub identity: Option<Arc<dyn SessionIdentity>>,
    pub confirmation: Option<Arc<dyn ConfirmationUi>>,
    pub audit: Option<Arc<dyn WindowAudit>>,
}

impl HostPorts {
    pub fn new(applications: Arc<dyn ApplicationAdapter>) -> Self {
        Self {
            applications,
            persist: None,
            identity: None,
            confirmation: None,
            audit: None,
        }
    }

    pub fn with_persist(mut self, adapter: Arc<dyn PersistAdapter>) -> Self {
        self.persist = Some(adapter);
        self
    }

    pub fn with_identity(mut self, identity: Arc<dyn SessionIdentity>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_confirmation_ui(mut self, ui: Arc<dyn ConfirmationUi>) -> Self {
        self.confirmation = Some(ui);
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn WindowAudit>) -> Self {
        self.audit = Some(audit);
        self
    }
}

/// Composition root for the window framework.
pub struct WindowServices;

impl WindowServices {
    /// Registers the default service graph in `container`.
    ///
    /// Fails with `ServiceUnavailable` if any of the services is already
    /// registered.
    pub fn install(container: &ServiceContainer, config: FrameworkConfig, ports: HostPorts) -> Result<()> {
        let store = Arc::new(StateStore::new());
        let registry = Arc::new(WindowRegistry::new());
        let gate = Arc::new(RemoteSyncGate::new(ports.identity.as_deref()));

        let mut bindings = BindingEngine::new(store.clone(), ports.persist.clone(), gate.clone())
            .with_default_debounce_ms(config.default_debounce_ms);
        let mut dispatcher = ActionDispatcher::new(registry.clone());
        let mut router = RemoteChangeRouter::new(registry.clone(), gate.clone());
        if let Some(logger) = &config.logger {
            bindings = bindings.with_logger(logger.clone());
            dispatcher = dispatcher.with_logger(logger.clone());
            router = router.with_logger(logger.clone());
        }
        if let Some(metrics) = config.metrics_handle() {
            bindings = bindings.with_metrics(metrics.clone());
            dispatcher = dispatcher.with_metrics(metrics);
        }
        if let Some(identity) = ports.identity {
            dispatcher = dispatcher.with_identity(identity);
        }
        if let Some(ui) = ports.confirmation {
            dispatcher = dispatcher.with_confirmation_ui(ui);
        }

        let audit: Arc<dyn WindowAudit> = ports.audit.unwrap_or_else(|| Arc::new(NullWindowAudit));

        container.insert(store)?;
        container.insert(registry)?;
        container.insert(gate)?;
        container.insert(Arc::new(bindings))?;
        container.insert(Arc::new(dispatcher))?;
        container.insert(Arc::new(router))?;
        container.insert(Arc::new(EventBus::new()))?;
        container.insert(Arc::new(RendererRegistry::new()))?;
        container.insert(Arc::new(WindowStateInitializer::new()))?;
        container.insert(Arc::new(PersistenceCoordinator::new(ports.persist.clone())))?;
        if let Some(adapter) = ports.persist {
            container.insert::<dyn PersistAdapter>(adapter)?;
        }
        container.insert::<dyn ApplicationAdapter>(ports.applications)?;
        container.insert::<dyn WindowAudit>(audit)?;
        container.insert(Arc::new(config))?;
        Ok(())
    }
}

impl ControllerServices {
    /// Resolves every controller collaborator from `container`.
    pub fn resolve(container: &ServiceContainer) -> Result<Self> {
        let config = container.get::<FrameworkConfig>()?;
        Ok(Self {
            store: container.get::<StateStore>()?,
            bindings: container.get::<BindingEngine>()?,
            dispatcher: container.get::<ActionDispatcher>()?,
            events: (*container.get::<EventBus>()?).clone(),
            gate: container.get::<RemoteSyncGate>()?,
            renderer: RendererCoordinator::new(container.get::<RendererRegistry>()?),
            persistence: (*container.get::<PersistenceCoordinator>()?).clone(),
            initializer: container.get::<WindowStateInitializer>()?,
            audit: container.get::<dyn WindowAudit>()?,
            container: Some(container.clone()),
            logger: config.logger.clone(),
            metrics: config.metrics_handle(),
            mount_selector: config.mount_selector.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::StaticElement;
    use crate::runtime::HeadlessApplicationAdapter;

    fn ports() -> HostPorts {
        HostPorts::new(Arc::new(HeadlessApplicationAdapter::new(Arc::new(
            StaticElement::empty(),
        ))))
    }

    #[test]
    fn install_registers_controller_services() {
        let container = ServiceContainer::new();
        WindowServices::install(&container, FrameworkConfig::default(), ports()).unwrap();

        let services = ControllerServices::resolve(&container).unwrap();
        assert_eq!(services.mount_selector, FrameworkConfig::default().mount_selector);
        assert!(!services.persistence.has_adapter());
        assert!(container.contains::<RemoteChangeRouter>());
        assert!(!container.contains::<dyn PersistAdapter>());
    }

    #[test]
    fn install_twice_is_rejected() {
        let container = ServiceContainer::new();
        WindowServices::install(&container, FrameworkConfig::default(), ports()).unwrap();
        let err = WindowServices::install(&container, FrameworkConfig::default(), ports()).unwrap_err();
        assert_eq!(err.code(), "ServiceUnavailable");
    }

    #[test]
    fn resolve_without_install_fails() {
        let err = ControllerServices::resolve(&ServiceContainer::new())
            .err()
            .map(|err| err.code());
        assert_eq!(err, Some("ServiceUnavailable"));
    }
}
