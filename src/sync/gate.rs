use serde_json::Value;

use crate::persist::{ORIGIN_META_KEY, PersistMeta};

/// Minimum role value the host assigns to game masters.
pub const GAMEMASTER_ROLE: u8 = 4;

/// Authenticated user of the current host session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: String,
    pub role: u8,
    pub is_gm: bool,
}

impl SessionUser {
    pub fn player(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: 1,
            is_gm: false,
        }
    }

    pub fn gamemaster(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: GAMEMASTER_ROLE,
            is_gm: true,
        }
    }

    pub fn has_elevated_role(&self) -> bool {
        self.is_gm || self.role >= GAMEMASTER_ROLE
    }
}

/// Source of the host session identity.
pub trait SessionIdentity: Send + Sync {
    fn current_user(&self) -> Option<SessionUser>;
}

/// Fixed identity, for headless hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user: Option<SessionUser>,
}

impl StaticIdentity {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn user(user: SessionUser) -> Self {
        Self { user: Some(user) }
    }
}

impl SessionIdentity for StaticIdentity {
    fn current_user(&self) -> Option<SessionUser> {
        self.user.clone()
    }
}

/// Tags outgoing writes with their origin and recognises their echoes.
#[derive(Debug, Clone)]
pub struct RemoteSyncGate {
    client_id: String,
}

impl RemoteSyncGate {
    /// Derives the client id from the session user, or generates one.
    pub fn new(identity: Option<&dyn SessionIdentity>) -> Self {
        let client_id = identity
            .and_then(|identity| identity.current_user())
            .map(|user| user.id)
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("client-{}", uuid::Uuid::new_v4()));
        Self { client_id }
    }

    pub fn with_client_id(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn make_persist_meta(&self, instance_id: &str) -> PersistMeta {
        PersistMeta {
            origin_client_id: self.client_id.clone(),
            origin_window_instance_id: instance_id.to_string(),
            render: false,
        }
    }

    /// Host update options carrying `meta` under the origin key.
    pub fn persist_options(&self, meta: &PersistMeta) -> Value {
        meta.to_options()
    }

    /// True only when `options` carries origin metadata naming `instance_id`.
    ///
    /// Window-scoped on purpose: other windows of the same client must still
    /// react to the change.
    pub fn is_from_window(&self, options: Option<&Value>, instance_id: &str) -> bool {
        options
            .and_then(|options| options.get(ORIGIN_META_KEY))
            .and_then(|meta| meta.get("originWindowInstanceId"))
            .and_then(Value::as_str)
            .is_some_and(|origin| origin == instance_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_id_comes_from_session_user() {
        let identity = StaticIdentity::user(SessionUser::player("user-7"));
        let gate = RemoteSyncGate::new(Some(&identity));
        assert_eq!(gate.client_id(), "user-7");
    }

    #[test]
    fn client_id_falls_back_to_generated_value() {
        let gate = RemoteSyncGate::new(Some(&StaticIdentity::anonymous()));
        assert!(gate.client_id().starts_with("client-"));
        let other = RemoteSyncGate::new(None);
        assert_ne!(gate.client_id(), other.client_id());
    }

    #[test]
    fn persist_meta_names_window_and_client() {
        let gate = RemoteSyncGate::with_client_id("c1");
        let meta = gate.make_persist_meta("w1");
        assert_eq!(meta.origin_client_id, "c1");
        assert_eq!(meta.origin_window_instance_id, "w1");
        assert!(!meta.render);

        let options = gate.persist_options(&meta);
        assert_eq!(options["render"], serde_json::json!(false));
        assert!(gate.is_from_window(Some(&options), "w1"));
    }

    #[test]
    fn echo_detection_is_window_scoped() {
        let gate = RemoteSyncGate::with_client_id("c1");
        let options = json!({
            "windowFrameworkOrigin": {
                "originClientId": "c1",
                "originWindowInstanceId": "w1",
                "render": false
            }
        });
        assert!(gate.is_from_window(Some(&options), "w1"));
        assert!(!gate.is_from_window(Some(&options), "w2"));
        assert!(!gate.is_from_window(Some(&json!({})), "w1"));
        assert!(!gate.is_from_window(None, "w1"));
    }
}
