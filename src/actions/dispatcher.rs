use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::error::{PermissionDenial, Result, WindowError};
use crate::logging::{ACTIONS_TARGET, LogLevel, Logger, emit, json_kv};
use crate::metrics::{self, SharedMetrics};
use crate::registry::WindowRegistry;
use crate::sync::SessionIdentity;

use super::types::{ActionContext, ActionDefinition, ConfirmationUi, PermissionCheck};

/// Runs actions through the permission, validation and confirmation gates.
pub struct ActionDispatcher {
    registry: Arc<WindowRegistry>,
    identity: Option<Arc<dyn SessionIdentity>>,
    ui: Option<Arc<dyn ConfirmationUi>>,
    logger: Option<Logger>,
    metrics: Option<SharedMetrics>,
}

impl ActionDispatcher {
    pub fn new(registry: Arc<WindowRegistry>) -> Self {
        Self {
            registry,
            identity: None,
            ui: None,
            logger: None,
            metrics: None,
        }
    }

    pub fn with_identity(mut self, identity: Arc<dyn SessionIdentity>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_confirmation_ui(mut self, ui: Arc<dyn ConfirmationUi>) -> Self {
        self.ui = Some(ui);
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Resolves `action_id` against the instance's definition and runs it.
    ///
    /// The handler only runs once every permission and validation rule has
    /// passed and the confirmation prompt, if any, was accepted.
    pub async fn dispatch(&self, action_id: &str, context: ActionContext) -> Result<()> {
        let outcome = self.run(action_id, &context).await;
        metrics::record(self.metrics.as_ref(), |m| m.record_dispatch(outcome.is_ok()));
        match &outcome {
            Ok(()) => emit(
                self.logger.as_ref(),
                LogLevel::Debug,
                ACTIONS_TARGET,
                "action completed",
                [
                    json_kv("instance_id", context.window_instance_id.as_str()),
                    json_kv("action", action_id),
                ],
            ),
            Err(err) => emit(
                self.logger.as_ref(),
                LogLevel::Info,
                ACTIONS_TARGET,
                "action rejected",
                [
                    json_kv("instance_id", context.window_instance_id.as_str()),
                    json_kv("action", action_id),
                    json_kv("code", err.code()),
                    json_kv("error", err.to_string()),
                ],
            ),
        }
        outcome
    }

    async fn run(&self, action_id: &str, context: &ActionContext) -> Result<()> {
        let instance = self.registry.get_instance(&context.window_instance_id)?;
        let definition = self.registry.get_definition(&instance.definition_id)?;
        let action = definition
            .action(action_id)
            .ok_or_else(|| WindowError::ActionNotFound(action_id.to_string()))?;

        std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.check_permissions(action, context)?;
            Self::validate(action, context)
        }))
        .map_err(WindowError::from_panic)??;
        AssertUnwindSafe(self.confirm(action))
            .catch_unwind()
            .await
            .map_err(WindowError::from_panic)??;

        AssertUnwindSafe(action.handler.handle(context))
            .catch_unwind()
            .await
            .map_err(WindowError::from_panic)?
    }

    fn check_permissions(&self, action: &ActionDefinition, context: &ActionContext) -> Result<()> {
        for permission in &action.permissions {
            self.check_permission(permission, context)?;
        }
        Ok(())
    }

    fn check_permission(&self, permission: &PermissionCheck, context: &ActionContext) -> Result<()> {
        let user = self
            .identity
            .as_ref()
            .and_then(|identity| identity.current_user());
        match permission {
            PermissionCheck::User => match user {
                Some(_) => Ok(()),
                None => Err(WindowError::permission(
                    PermissionDenial::NotAuthenticated,
                    "User is not authenticated",
                )),
            },
            PermissionCheck::Gm => match user {
                None => Err(WindowError::permission(
                    PermissionDenial::NotAuthenticated,
                    "User is not authenticated",
                )),
                Some(user) if user.has_elevated_role() => Ok(()),
                Some(_) => Err(WindowError::permission(
                    PermissionDenial::InsufficientPermissions,
                    "This action requires Game Master permissions",
                )),
            },
            PermissionCheck::Custom(None) => Err(WindowError::permission(
                PermissionDenial::InvalidPermission,
                "Custom permission check requires a check function",
            )),
            PermissionCheck::Custom(Some(check)) => {
                if check(context) {
                    Ok(())
                } else {
                    Err(WindowError::permission(
                        PermissionDenial::InsufficientPermissions,
                        "Custom permission check failed",
                    ))
                }
            }
            PermissionCheck::Unknown(kind) => Err(WindowError::permission(
                PermissionDenial::UnknownPermissionType,
                format!("Unknown permission type: {kind}"),
            )),
        }
    }

    fn validate(action: &ActionDefinition, context: &ActionContext) -> Result<()> {
        match action.validation.iter().find(|rule| !rule.check(context)) {
            Some(rule) => Err(WindowError::ValidationFailed(
                rule.message
                    .clone()
                    .unwrap_or_else(|| "Action validation failed".to_string()),
            )),
            None => Ok(()),
        }
    }

    async fn confirm(&self, action: &ActionDefinition) -> Result<()> {
        let Some(request) = &action.confirm else {
            return Ok(());
        };
        // no prompt available means nobody can agree
        let Some(ui) = &self.ui else {
            return Err(WindowError::ActionCancelled);
        };
        if ui.confirm(request).await {
            Ok(())
        } else {
            Err(WindowError::ActionCancelled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ConfirmRequest, NotifyLevel, ValidationRule, handler_fn};
    use crate::registry::{ComponentDescriptor, WindowDefinition, WindowInstance};
    use crate::state::StateMap;
    use crate::sync::{SessionUser, StaticIdentity};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedUi {
        answer: bool,
        asked: AtomicUsize,
    }

    #[async_trait]
    impl ConfirmationUi for ScriptedUi {
        async fn confirm(&self, _request: &ConfirmRequest) -> bool {
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.answer
        }

        fn notify(&self, _message: &str, _level: NotifyLevel) {}
    }

    fn counting_action(id: &str, calls: Arc<AtomicUsize>) -> ActionDefinition {
        ActionDefinition::new(
            id,
            handler_fn(move |_ctx| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        )
    }

    fn registry_with(action: ActionDefinition) -> Arc<WindowRegistry> {
        let registry = Arc::new(WindowRegistry::new());
        registry
            .register_definition(
                WindowDefinition::new("test-window", "Test", ComponentDescriptor::new("panel"))
                    .with_action(action),
            )
            .unwrap();
        registry
            .register_instance(WindowInstance::new("test-window:1", "test-window"))
            .unwrap();
        registry
    }

    fn context() -> ActionContext {
        ActionContext::new("test-window:1", StateMap::new())
    }

    #[tokio::test]
    async fn unknown_instance_and_action_are_reported() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = ActionDispatcher::new(registry_with(counting_action("save", calls)));

        let err = dispatcher
            .dispatch("save", ActionContext::new("missing", StateMap::new()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "InstanceNotFound");

        let err = dispatcher.dispatch("delete", context()).await.unwrap_err();
        assert_eq!(err.code(), "ActionNotFound");
    }

    #[tokio::test]
    async fn gm_permission_distinguishes_denials() {
        let calls = Arc::new(AtomicUsize::new(0));
        let action = counting_action("purge", calls.clone()).require(PermissionCheck::Gm);
        let registry = registry_with(action);

        let anonymous = ActionDispatcher::new(registry.clone())
            .with_identity(Arc::new(StaticIdentity::anonymous()));
        let err = anonymous.dispatch("purge", context()).await.unwrap_err();
        assert!(matches!(
            err,
            WindowError::PermissionDenied {
                reason: PermissionDenial::NotAuthenticated,
                ..
            }
        ));

        let player = ActionDispatcher::new(registry.clone())
            .with_identity(Arc::new(StaticIdentity::user(SessionUser::player("p1"))));
        let err = player.dispatch("purge", context()).await.unwrap_err();
        assert!(matches!(
            err,
            WindowError::PermissionDenied {
                reason: PermissionDenial::InsufficientPermissions,
                ..
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let gm = ActionDispatcher::new(registry)
            .with_identity(Arc::new(StaticIdentity::user(SessionUser::gamemaster("gm"))));
        gm.dispatch("purge", context()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn elevated_role_counts_as_gm() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = registry_with(counting_action("purge", calls.clone()).require(PermissionCheck::Gm));
        let assistant = SessionUser {
            id: "a1".into(),
            role: 4,
            is_gm: false,
        };
        let dispatcher = ActionDispatcher::new(registry)
            .with_identity(Arc::new(StaticIdentity::user(assistant)));
        dispatcher.dispatch("purge", context()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn custom_and_unknown_permissions_fail_closed() {
        let calls = Arc::new(AtomicUsize::new(0));
        for (permission, reason) in [
            (PermissionCheck::Custom(None), PermissionDenial::InvalidPermission),
            (PermissionCheck::custom(|_| false), PermissionDenial::InsufficientPermissions),
            (PermissionCheck::from_kind("owner"), PermissionDenial::UnknownPermissionType),
        ] {
            let registry = registry_with(counting_action("act", calls.clone()).require(permission));
            let err = ActionDispatcher::new(registry)
                .dispatch("act", context())
                .await
                .unwrap_err();
            match err {
                WindowError::PermissionDenied { reason: actual, .. } => assert_eq!(actual, reason),
                other => panic!("unexpected error {other:?}"),
            }
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn first_failing_validation_rule_wins() {
        let calls = Arc::new(AtomicUsize::new(0));
        let action = counting_action("rename", calls.clone())
            .validate(ValidationRule::new(|ctx| ctx.param("name").is_some()))
            .validate(ValidationRule::new(|_| false).with_message("never reached"));
        let dispatcher = ActionDispatcher::new(registry_with(action));

        let err = dispatcher.dispatch("rename", context()).await.unwrap_err();
        assert_eq!(err, WindowError::ValidationFailed("Action validation failed".into()));

        let mut ctx = context();
        ctx.metadata.params.insert("name".into(), json!("new"));
        let err = dispatcher.dispatch("rename", ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "never reached");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn confirmation_gates_the_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let action = counting_action("delete", calls.clone())
            .confirm(ConfirmRequest::new("Delete", "Really delete?"));
        let registry = registry_with(action);

        let err = ActionDispatcher::new(registry.clone())
            .dispatch("delete", context())
            .await
            .unwrap_err();
        assert_eq!(err, WindowError::ActionCancelled);

        let declined = Arc::new(ScriptedUi {
            answer: false,
            asked: AtomicUsize::new(0),
        });
        let err = ActionDispatcher::new(registry.clone())
            .with_confirmation_ui(declined.clone())
            .dispatch("delete", context())
            .await
            .unwrap_err();
        assert_eq!(err, WindowError::ActionCancelled);
        assert_eq!(declined.asked.load(Ordering::SeqCst), 1);

        let accepted = Arc::new(ScriptedUi {
            answer: true,
            asked: AtomicUsize::new(0),
        });
        ActionDispatcher::new(registry)
            .with_confirmation_ui(accepted)
            .dispatch("delete", context())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_handler_becomes_unexpected_error() {
        let action = ActionDefinition::new(
            "boom",
            handler_fn(|_ctx| async move {
                if true {
                    panic!("handler exploded");
                }
                Ok(())
            }),
        );
        let metrics = crate::metrics::WindowMetrics::shared();
        let dispatcher =
            ActionDispatcher::new(registry_with(action)).with_metrics(metrics.clone());

        let err = dispatcher.dispatch("boom", context()).await.unwrap_err();
        assert_eq!(err, WindowError::UnexpectedError("handler exploded".into()));
        assert_eq!(
            metrics
                .lock()
                .unwrap()
                .snapshot(std::time::Duration::ZERO)
                .dispatch_failures,
            1
        );
    }

    #[tokio::test]
    async fn panicking_gate_checks_become_unexpected_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let guarded = counting_action("guarded", calls.clone())
            .require(PermissionCheck::custom(|_| panic!("predicate exploded")));
        let err = ActionDispatcher::new(registry_with(guarded))
            .dispatch("guarded", context())
            .await
            .unwrap_err();
        assert_eq!(err, WindowError::UnexpectedError("predicate exploded".into()));

        let validated = counting_action("validated", calls.clone())
            .validate(ValidationRule::new(|_| panic!("rule exploded")));
        let err = ActionDispatcher::new(registry_with(validated))
            .dispatch("validated", context())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UnexpectedError");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
