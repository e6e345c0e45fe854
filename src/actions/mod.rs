mod dispatcher;
mod types;

pub use dispatcher::ActionDispatcher;
pub use types::{
    ActionContext, ActionDefinition, ActionHandler, ActionMetadata, ActionParams,
    ConfirmRequest, ConfirmationUi, NotifyLevel, PermissionCheck, PermissionPredicate,
    ValidationRule, handler_fn,
};
