use thiserror::Error;

/// Unified result type for the window framework.
pub type Result<T> = std::result::Result<T, WindowError>;

/// Why a permission check refused an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDenial {
    NotAuthenticated,
    InsufficientPermissions,
    InvalidPermission,
    UnknownPermissionType,
}

impl PermissionDenial {
    pub fn code(self) -> &'static str {
        match self {
            PermissionDenial::NotAuthenticated => "NotAuthenticated",
            PermissionDenial::InsufficientPermissions => "InsufficientPermissions",
            PermissionDenial::InvalidPermission => "InvalidPermission",
            PermissionDenial::UnknownPermissionType => "UnknownPermissionType",
        }
    }
}

/// Errors surfaced by the window engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WindowError {
    #[error("Instance {0} not found")]
    InstanceNotFound(String),
    #[error("Key {key} not found in instance {instance_id}")]
    KeyNotFound { instance_id: String, key: String },
    #[error("Definition {0} not found")]
    DefinitionNotFound(String),
    #[error("Definition {0} already exists")]
    DefinitionAlreadyExists(String),
    #[error("Instance {0} already exists")]
    InstanceAlreadyExists(String),
    #[error("Action {0} not found")]
    ActionNotFound(String),
    #[error("{message}")]
    PermissionDenied {
        reason: PermissionDenial,
        message: String,
    },
    #[error("{0}")]
    ValidationFailed(String),
    #[error("Action was cancelled by user")]
    ActionCancelled,
    #[error("{0}")]
    InvalidBindingSource(String),
    #[error("{0}")]
    BindingLoadFailed(String),
    #[error("{0}")]
    BindingSaveFailed(String),
    #[error("No persist configuration found")]
    NoPersistConfig,
    #[error("No persist adapter available")]
    NoPersistAdapter,
    #[error("{0}")]
    PersistFailed(String),
    #[error("{0}")]
    RestoreFailed(String),
    #[error("Mount point {0} not found")]
    MountPointNotFound(String),
    #[error("Renderer for type \"{0}\" not found")]
    RendererNotFound(String),
    #[error("{0}")]
    MountFailed(String),
    #[error("{0}")]
    UnmountFailed(String),
    #[error("{0}")]
    UpdateFailed(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("{0}")]
    UnexpectedError(String),
}

impl WindowError {
    /// Stable error code shared with the host-side callers.
    pub fn code(&self) -> &'static str {
        match self {
            WindowError::InstanceNotFound(_) => "InstanceNotFound",
            WindowError::KeyNotFound { .. } => "KeyNotFound",
            WindowError::DefinitionNotFound(_) => "DefinitionNotFound",
            WindowError::DefinitionAlreadyExists(_) => "DefinitionAlreadyExists",
            WindowError::InstanceAlreadyExists(_) => "InstanceAlreadyExists",
            WindowError::ActionNotFound(_) => "ActionNotFound",
            WindowError::PermissionDenied { .. } => "PermissionDenied",
            WindowError::ValidationFailed(_) => "ValidationFailed",
            WindowError::ActionCancelled => "ActionCancelled",
            WindowError::InvalidBindingSource(_) => "InvalidBindingSource",
            WindowError::BindingLoadFailed(_) => "BindingLoadFailed",
            WindowError::BindingSaveFailed(_) => "BindingSaveFailed",
            WindowError::NoPersistConfig => "NoPersistConfig",
            WindowError::NoPersistAdapter => "NoPersistAdapter",
            WindowError::PersistFailed(_) => "PersistFailed",
            WindowError::RestoreFailed(_) => "RestoreFailed",
            WindowError::MountPointNotFound(_) => "MountPointNotFound",
            WindowError::RendererNotFound(_) => "RendererNotFound",
            WindowError::MountFailed(_) => "MountFailed",
            WindowError::UnmountFailed(_) => "UnmountFailed",
            WindowError::UpdateFailed(_) => "UpdateFailed",
            WindowError::ServiceUnavailable(_) => "ServiceUnavailable",
            WindowError::UnexpectedError(_) => "UnexpectedError",
        }
    }

    pub(crate) fn permission(reason: PermissionDenial, message: impl Into<String>) -> Self {
        WindowError::PermissionDenied {
            reason,
            message: message.into(),
        }
    }

    /// Converts a caught panic payload into an `UnexpectedError`.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "unknown panic".to_string()
        };
        WindowError::UnexpectedError(message)
    }
}

/// Errors reported by persist adapters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistError {
    #[error("{0}")]
    InvalidType(String),
    #[error("{0}")]
    InvalidConfig(String),
    #[error("{0}")]
    DocumentNotFound(String),
    #[error("{0}")]
    SaveFailed(String),
    #[error("{0}")]
    LoadFailed(String),
}

impl PersistError {
    pub fn code(&self) -> &'static str {
        match self {
            PersistError::InvalidType(_) => "InvalidType",
            PersistError::InvalidConfig(_) => "InvalidConfig",
            PersistError::DocumentNotFound(_) => "DocumentNotFound",
            PersistError::SaveFailed(_) => "SaveFailed",
            PersistError::LoadFailed(_) => "LoadFailed",
        }
    }
}
