use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::FutureExt;
use serde_json::Value;

use crate::actions::{ActionContext, ActionDispatcher, ActionMetadata, ActionParams};
use crate::binding::{BindingEngine, SyncPolicy};
use crate::error::{Result, WindowError};
use crate::events::{EventBus, EventKind, Subscription, WindowEvent};
use crate::logging::{CONTROLLER_TARGET, LogLevel, Logger, emit, json_kv};
use crate::metrics::{self, SharedMetrics};
use crate::persist::PersistMeta;
use crate::registry::WindowDefinition;
use crate::render::{BoundAction, ComponentInstance, HostElement, RendererCoordinator, ViewModel};
use crate::state::{StateMap, StateStore, WindowState};
use crate::sync::RemoteSyncGate;

use super::audit::{WindowAudit, WindowAuditEventBuilder, WindowAuditStage};
use super::container::ServiceContainer;
use super::initializer::WindowStateInitializer;
use super::persistence::PersistenceCoordinator;

/// Action dispatched in the background right after a window mounts.
pub const ON_OPEN_ACTION: &str = "onOpen";

/// Shared collaborators every controller is wired to.
#[derive(Clone)]
pub struct ControllerServices {
    pub store: Arc<StateStore>,
    pub bindings: Arc<BindingEngine>,
    pub dispatcher: Arc<ActionDispatcher>,
    pub events: EventBus,
    pub gate: Arc<RemoteSyncGate>,
    pub renderer: RendererCoordinator,
    pub persistence: PersistenceCoordinator,
    pub initializer: Arc<WindowStateInitializer>,
    pub audit: Arc<dyn WindowAudit>,
    pub container: Option<ServiceContainer>,
    pub logger: Option<Logger>,
    pub metrics: Option<SharedMetrics>,
    pub mount_selector: String,
}

/// How [`WindowController::update_state_local`] propagates a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    pub persist: bool,
    pub sync: SyncPolicy,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            persist: false,
            sync: SyncPolicy::None,
        }
    }
}

impl UpdateOptions {
    pub fn persisted() -> Self {
        Self {
            persist: true,
            ..Self::default()
        }
    }

    pub fn with_sync(mut self, sync: SyncPolicy) -> Self {
        self.sync = sync;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Unmounted,
    Mounting,
    Mounted,
}

struct MountState {
    phase: Phase,
    component: Option<ComponentInstance>,
    listener: Option<Subscription>,
}

/// Lifecycle of one window instance.
///
/// The host drives it through [`on_render`](Self::on_render),
/// [`on_update`](Self::on_update) and [`on_close`](Self::on_close); the UI
/// changes state only through [`update_state_local`](Self::update_state_local)
/// and runs commands through [`dispatch_action`](Self::dispatch_action).
pub struct WindowController {
    instance_id: String,
    definition: Arc<WindowDefinition>,
    state: WindowState,
    services: ControllerServices,
    mount: Mutex<MountState>,
    this: Weak<WindowController>,
}

impl WindowController {
    pub fn new(
        instance_id: impl Into<String>,
        definition: WindowDefinition,
        services: ControllerServices,
    ) -> Arc<Self> {
        let instance_id = instance_id.into();
        Arc::new_cyclic(|this| Self {
            state: WindowState::new(instance_id.clone(), services.store.clone()),
            instance_id,
            definition: Arc::new(definition),
            services,
            mount: Mutex::new(MountState {
                phase: Phase::Unmounted,
                component: None,
                listener: None,
            }),
            this: this.clone(),
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn definition_id(&self) -> &str {
        &self.definition.definition_id
    }

    pub fn definition(&self) -> &WindowDefinition {
        &self.definition
    }

    /// Current state snapshot.
    pub fn state(&self) -> StateMap {
        self.state.get()
    }

    pub fn state_port(&self) -> &WindowState {
        &self.state
    }

    pub fn is_mounted(&self) -> bool {
        self.lock_mount().phase == Phase::Mounted
    }

    pub fn component(&self) -> Option<ComponentInstance> {
        self.lock_mount().component.clone()
    }

    /// Mounts the window into `element`; a no-op while already mounted.
    pub async fn on_render(&self, element: &dyn HostElement) -> Result<()> {
        {
            let mut mount = self.lock_mount();
            if mount.phase != Phase::Unmounted {
                drop(mount);
                self.audit(WindowAuditEventBuilder::new(
                    WindowAuditStage::RenderSkipped,
                    &self.instance_id,
                ));
                return Ok(());
            }
            mount.phase = Phase::Mounting;
        }

        let component = match self.mount_into(element).await {
            Ok(component) => component,
            Err(err) => {
                self.lock_mount().phase = Phase::Unmounted;
                self.log(
                    LogLevel::Error,
                    "window mount failed",
                    [json_kv("code", err.code()), json_kv("error", err.to_string())],
                );
                return Err(err);
            }
        };

        let listener = self.register_action_listener();
        {
            let mut mount = self.lock_mount();
            mount.phase = Phase::Mounted;
            mount.component = Some(component);
            mount.listener = Some(listener);
        }

        self.services.events.emit(WindowEvent::WindowRendered {
            instance_id: self.instance_id.clone(),
        });
        metrics::record(self.services.metrics.as_ref(), |m| m.record_mount());
        self.audit(
            WindowAuditEventBuilder::new(WindowAuditStage::Mounted, &self.instance_id)
                .detail("definition_id", self.definition_id()),
        );
        self.log(LogLevel::Info, "window mounted", []);

        if self.definition.action(ON_OPEN_ACTION).is_some() {
            if let Some(this) = self.this.upgrade() {
                this.spawn_dispatch(ON_OPEN_ACTION.to_string(), None, None);
            }
        }
        Ok(())
    }

    async fn mount_into(&self, element: &dyn HostElement) -> Result<ComponentInstance> {
        let seeded = self.services.initializer.seed(&self.state, &self.definition);
        if !seeded.is_empty() {
            self.log(
                LogLevel::Debug,
                "seeded default state",
                [json_kv("keys", seeded)],
            );
        }

        self.services
            .bindings
            .initialize(&self.definition, &self.instance_id)?;

        let view_model = self.view_model();
        let selector = &self.services.mount_selector;
        let mount_point = element
            .query(selector)
            .ok_or_else(|| WindowError::MountPointNotFound(selector.clone()))?;

        self.services
            .renderer
            .mount(&self.definition.component, &mount_point, &view_model)
            .await
    }

    /// Pushes the current view model to the mounted component.
    pub async fn on_update(&self, _element: &dyn HostElement) -> Result<()> {
        let Some(component) = self.component() else {
            return Ok(());
        };
        self.services
            .renderer
            .update(&self.definition.component, &component, &self.view_model())
            .await
    }

    /// Unmounts and persists the window. Unmount and persist failures are
    /// logged; closing itself always succeeds.
    pub async fn on_close(&self) -> Result<()> {
        let (component, listener) = {
            let mut mount = self.lock_mount();
            mount.phase = Phase::Unmounted;
            (mount.component.take(), mount.listener.take())
        };

        if let Some(listener) = listener {
            listener.unsubscribe();
        }
        self.services.bindings.cancel_pending(&self.instance_id);

        if let Some(component) = component {
            if let Err(err) = self
                .services
                .renderer
                .unmount(&self.definition.component, &component)
                .await
            {
                self.log(
                    LogLevel::Warn,
                    "component unmount failed",
                    [json_kv("error", err.to_string())],
                );
            }
        }

        if let Some(config) = &self.definition.persist {
            let meta = self.services.gate.make_persist_meta(&self.instance_id);
            if let Err(err) = self
                .services
                .persistence
                .persist(config, &self.state.get(), Some(&meta))
                .await
            {
                self.log(
                    LogLevel::Warn,
                    "persist on close failed",
                    [json_kv("error", err.to_string())],
                );
            }
        }

        self.services.events.emit(WindowEvent::WindowClosed {
            instance_id: self.instance_id.clone(),
        });
        metrics::record(self.services.metrics.as_ref(), |m| m.record_close());
        self.audit(WindowAuditEventBuilder::new(
            WindowAuditStage::Closed,
            &self.instance_id,
        ));
        self.log(LogLevel::Info, "window closed", []);
        Ok(())
    }

    /// The one entry point for UI-driven state changes.
    ///
    /// Patches state, then persists (when requested and configured), then
    /// syncs bindings. A persist failure skips the sync; either failure
    /// returns before any `state:updated` event is emitted.
    pub async fn update_state_local(&self, updates: &StateMap, options: UpdateOptions) -> Result<()> {
        self.state.patch(updates);

        if options.persist {
            if let Some(config) = &self.definition.persist {
                let meta = self.services.gate.make_persist_meta(&self.instance_id);
                self.services
                    .persistence
                    .persist(config, &self.state.get(), Some(&meta))
                    .await?;
            }
        }

        if options.sync.effective() != SyncPolicy::None {
            self.services
                .bindings
                .sync(&self.instance_id, options.sync)
                .await?;
        }

        self.emit_state_updates(updates);
        metrics::record(self.services.metrics.as_ref(), |m| {
            m.record_state_update(updates.len())
        });
        self.audit(
            WindowAuditEventBuilder::new(WindowAuditStage::StateUpdated, &self.instance_id)
                .detail("keys", updates.len()),
        );
        Ok(())
    }

    /// Applies a change that originated elsewhere; never persists or syncs.
    pub async fn apply_remote_patch(&self, updates: &StateMap) -> Result<()> {
        self.state.patch(updates);
        self.emit_state_updates(updates);
        metrics::record(self.services.metrics.as_ref(), |m| m.record_remote_patch());
        self.audit(
            WindowAuditEventBuilder::new(WindowAuditStage::RemotePatchApplied, &self.instance_id)
                .detail("keys", updates.len()),
        );
        Ok(())
    }

    /// Saves the whole state; `meta` defaults to this window's origin.
    pub async fn persist(&self, meta: Option<PersistMeta>) -> Result<()> {
        let config = self
            .definition
            .persist
            .as_ref()
            .ok_or(WindowError::NoPersistConfig)?;
        let meta = meta.unwrap_or_else(|| self.services.gate.make_persist_meta(&self.instance_id));
        self.services
            .persistence
            .persist(config, &self.state.get(), Some(&meta))
            .await?;
        self.audit(
            WindowAuditEventBuilder::new(WindowAuditStage::Persisted, &self.instance_id)
                .detail("target", config.target.address()),
        );
        Ok(())
    }

    /// Loads persisted state and applies it as a remote patch. Does nothing
    /// unless the persist config asks to restore on open.
    pub async fn restore(&self) -> Result<()> {
        let config = self
            .definition
            .persist
            .as_ref()
            .ok_or(WindowError::NoPersistConfig)?;
        if !self.services.persistence.has_adapter() {
            return Err(WindowError::NoPersistAdapter);
        }
        if !config.restore_on_open {
            return Ok(());
        }

        let loaded = self.services.persistence.restore(config).await?;
        if !loaded.is_empty() {
            self.apply_remote_patch(&loaded).await?;
        }
        self.audit(
            WindowAuditEventBuilder::new(WindowAuditStage::Restored, &self.instance_id)
                .detail("keys", loaded.len()),
        );
        Ok(())
    }

    pub async fn dispatch_action(
        &self,
        action_id: &str,
        control_id: Option<String>,
        event: Option<Value>,
        params: Option<ActionParams>,
    ) -> Result<()> {
        let context = ActionContext {
            window_instance_id: self.instance_id.clone(),
            state: self.state.get(),
            control_id,
            event,
            metadata: ActionMetadata {
                controller: self.this.upgrade(),
                container: self.services.container.clone(),
                params: params.unwrap_or_default(),
            },
        };
        self.services.dispatcher.dispatch(action_id, context).await
    }

    /// Cancels pending binding writes and drops the instance's state.
    pub fn dispose(&self) {
        if let Some(listener) = self.lock_mount().listener.take() {
            listener.unsubscribe();
        }
        self.services.bindings.dispose(&self.instance_id);
        // clear never fails
        let _ = self.services.store.clear(&self.instance_id);
        self.audit(WindowAuditEventBuilder::new(
            WindowAuditStage::Disposed,
            &self.instance_id,
        ));
    }

    /// State port plus one bound entry point per declared action.
    pub fn view_model(&self) -> ViewModel {
        let mut view_model = ViewModel::new(self.state.clone());
        for action in &self.definition.actions {
            let controller = self.this.clone();
            let action_id = action.id.clone();
            let instance_id = self.instance_id.clone();
            view_model.actions.insert(
                action.id.clone(),
                BoundAction::new(move |event| {
                    let controller = controller.upgrade();
                    let action_id = action_id.clone();
                    let instance_id = instance_id.clone();
                    async move {
                        match controller {
                            Some(controller) => {
                                controller.dispatch_action(&action_id, None, event, None).await
                            }
                            None => Err(WindowError::InstanceNotFound(instance_id)),
                        }
                    }
                    .boxed()
                }),
            );
        }
        view_model
    }

    fn register_action_listener(&self) -> Subscription {
        let controller = self.this.clone();
        let instance_id = self.instance_id.clone();
        self.services
            .events
            .on(EventKind::ControlAction, move |event| {
                let WindowEvent::ControlAction {
                    instance_id: target,
                    control_id,
                    action_id,
                    event: payload,
                } = event
                else {
                    return;
                };
                if *target != instance_id {
                    return;
                }
                if let Some(controller) = controller.upgrade() {
                    controller.spawn_dispatch(
                        action_id.clone(),
                        Some(control_id.clone()),
                        payload.clone(),
                    );
                }
            })
    }

    fn spawn_dispatch(self: &Arc<Self>, action_id: String, control_id: Option<String>, event: Option<Value>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.log(
                LogLevel::Warn,
                "no async runtime; action dropped",
                [json_kv("action", action_id)],
            );
            return;
        };
        let controller = Arc::clone(self);
        runtime.spawn(async move {
            if let Err(err) = controller
                .dispatch_action(&action_id, control_id, event, None)
                .await
            {
                controller.log(
                    LogLevel::Warn,
                    "background action failed",
                    [
                        json_kv("action", action_id),
                        json_kv("code", err.code()),
                        json_kv("error", err.to_string()),
                    ],
                );
            }
        });
    }

    fn emit_state_updates(&self, updates: &StateMap) {
        for (key, value) in updates {
            self.services.events.emit(WindowEvent::StateUpdated {
                instance_id: self.instance_id.clone(),
                key: key.clone(),
                value: value.clone(),
            });
        }
    }

    fn lock_mount(&self) -> MutexGuard<'_, MountState> {
        self.mount.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn audit(&self, builder: WindowAuditEventBuilder) {
        self.services.audit.record(builder.finish());
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        emit(
            self.services.logger.as_ref(),
            level,
            CONTROLLER_TARGET,
            message,
            std::iter::once(json_kv("instance_id", self.instance_id.as_str())).chain(fields),
        );
    }
}
