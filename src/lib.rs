//! State, binding and persistence engine for host-rendered windows.
//!
//! A [`WindowFactory`] turns registered [`WindowDefinition`]s into live
//! windows. Each window is driven by a [`WindowController`] that owns its
//! lifecycle, routes UI changes through [`WindowController::update_state_local`],
//! keeps bound host data in step through the [`BindingEngine`] and runs
//! commands through the [`ActionDispatcher`]. Writes are tagged by the
//! [`RemoteSyncGate`] so a window ignores the echo of its own changes.

pub mod actions;
pub mod binding;
pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod persist;
pub mod registry;
pub mod render;
pub mod runtime;
pub mod state;
pub mod sync;

pub use actions::{
    ActionContext, ActionDefinition, ActionDispatcher, ActionHandler, ConfirmationUi,
    PermissionCheck, ValidationRule, handler_fn,
};
pub use binding::{BindingDescriptor, BindingEngine, BindingSource, BindingTarget, SyncPolicy};
pub use error::{PermissionDenial, PersistError, Result, WindowError};
pub use events::{EventBus, EventKind, Subscription, WindowEvent};
pub use logging::{LogEvent, LogFields, LogLevel, Logger, LoggingError, LoggingResult};
pub use metrics::{MetricSnapshot, SharedMetrics, WindowMetrics};
pub use persist::{MemoryPersistAdapter, PersistAdapter, PersistConfig, PersistMeta, PersistTarget};
pub use registry::{
    ComponentDescriptor, ControlDescriptor, DependencyDescriptor, WindowDefinition,
    WindowInstance, WindowOverrides, WindowRegistry,
};
pub use render::{HeadlessRenderer, HostElement, Renderer, RendererRegistry, StaticElement};
pub use runtime::{
    FrameworkConfig, FrameworkSettings, HeadlessApplicationAdapter, HostPorts, ServiceContainer,
    UpdateOptions, WindowController, WindowFactory, WindowHandle, WindowServices,
};
pub use state::{StateMap, StateStore, WindowState};
pub use sync::{RemoteChangeRouter, RemoteSyncGate, SessionIdentity, SessionUser, StaticIdentity};
