use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::runtime::{ServiceContainer, WindowController};
use crate::state::StateMap;

/// Free-form parameters passed along with an action invocation.
pub type ActionParams = Map<String, Value>;

/// Collaborators handed to action handlers instead of any global lookup.
#[derive(Clone, Default)]
pub struct ActionMetadata {
    pub controller: Option<Arc<WindowController>>,
    pub container: Option<ServiceContainer>,
    pub params: ActionParams,
}

impl fmt::Debug for ActionMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionMetadata")
            .field("controller", &self.controller.as_ref().map(|c| c.instance_id()))
            .field("container", &self.container.is_some())
            .field("params", &self.params)
            .finish()
    }
}

/// Everything a handler needs to know about one invocation.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub window_instance_id: String,
    pub state: StateMap,
    pub control_id: Option<String>,
    pub event: Option<Value>,
    pub metadata: ActionMetadata,
}

impl ActionContext {
    pub fn new(window_instance_id: impl Into<String>, state: StateMap) -> Self {
        Self {
            window_instance_id: window_instance_id.into(),
            state,
            control_id: None,
            event: None,
            metadata: ActionMetadata::default(),
        }
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.metadata.params.get(key)
    }
}

/// Command executed when an action is dispatched.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, context: &ActionContext) -> Result<()>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ActionHandler for FnHandler<F>
where
    F: Fn(ActionContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn handle(&self, context: &ActionContext) -> Result<()> {
        (self.0)(context.clone()).await
    }
}

/// Wraps an async closure as an [`ActionHandler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ActionHandler>
where
    F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

pub type PermissionPredicate = Arc<dyn Fn(&ActionContext) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum PermissionCheck {
    /// Any authenticated session user.
    User,
    /// Users with an elevated (game master) role.
    Gm,
    /// Caller-supplied predicate; `None` fails closed.
    Custom(Option<PermissionPredicate>),
    /// Kind not understood by this dispatcher; always fails closed.
    Unknown(String),
}

impl PermissionCheck {
    pub fn custom<F>(check: F) -> Self
    where
        F: Fn(&ActionContext) -> bool + Send + Sync + 'static,
    {
        PermissionCheck::Custom(Some(Arc::new(check)))
    }

    /// Maps a declarative permission kind onto a check.
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "user" => PermissionCheck::User,
            "gm" => PermissionCheck::Gm,
            "custom" => PermissionCheck::Custom(None),
            other => PermissionCheck::Unknown(other.to_string()),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            PermissionCheck::User => "user",
            PermissionCheck::Gm => "gm",
            PermissionCheck::Custom(_) => "custom",
            PermissionCheck::Unknown(kind) => kind,
        }
    }
}

impl fmt::Debug for PermissionCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PermissionCheck({})", self.kind())
    }
}

#[derive(Clone)]
pub struct ValidationRule {
    pub message: Option<String>,
    validate: Arc<dyn Fn(&ActionContext) -> bool + Send + Sync>,
}

impl ValidationRule {
    pub fn new<F>(validate: F) -> Self
    where
        F: Fn(&ActionContext) -> bool + Send + Sync + 'static,
    {
        Self {
            message: None,
            validate: Arc::new(validate),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn check(&self, context: &ActionContext) -> bool {
        (self.validate)(context)
    }
}

impl fmt::Debug for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRule")
            .field("message", &self.message)
            .finish()
    }
}

/// Prompt shown before a destructive action runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub confirm_label: Option<String>,
    #[serde(default)]
    pub cancel_label: Option<String>,
}

impl ConfirmRequest {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            confirm_label: None,
            cancel_label: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Warning,
    Error,
}

/// User-facing prompts provided by the host UI.
#[async_trait]
pub trait ConfirmationUi: Send + Sync {
    async fn confirm(&self, request: &ConfirmRequest) -> bool;
    fn notify(&self, message: &str, level: NotifyLevel);
}

#[derive(Clone)]
pub struct ActionDefinition {
    pub id: String,
    pub handler: Arc<dyn ActionHandler>,
    pub permissions: Vec<PermissionCheck>,
    pub validation: Vec<ValidationRule>,
    pub confirm: Option<ConfirmRequest>,
}

impl ActionDefinition {
    pub fn new(id: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        Self {
            id: id.into(),
            handler,
            permissions: Vec::new(),
            validation: Vec::new(),
            confirm: None,
        }
    }

    pub fn require(mut self, permission: PermissionCheck) -> Self {
        self.permissions.push(permission);
        self
    }

    pub fn validate(mut self, rule: ValidationRule) -> Self {
        self.validation.push(rule);
        self
    }

    pub fn confirm(mut self, request: ConfirmRequest) -> Self {
        self.confirm = Some(request);
        self
    }
}

impl fmt::Debug for ActionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("id", &self.id)
            .field("permissions", &self.permissions)
            .field("validation", &self.validation)
            .field("confirm", &self.confirm)
            .finish()
    }
}
