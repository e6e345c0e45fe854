use std::sync::Arc;

use crate::error::{Result, WindowError};
use crate::persist::{PersistAdapter, PersistConfig, PersistMeta};
use crate::state::StateMap;

/// Saves and restores whole window state through the persist adapter.
#[derive(Clone, Default)]
pub struct PersistenceCoordinator {
    adapter: Option<Arc<dyn PersistAdapter>>,
}

impl PersistenceCoordinator {
    pub fn new(adapter: Option<Arc<dyn PersistAdapter>>) -> Self {
        Self { adapter }
    }

    pub fn has_adapter(&self) -> bool {
        self.adapter.is_some()
    }

    pub async fn persist(
        &self,
        config: &PersistConfig,
        state: &StateMap,
        meta: Option<&PersistMeta>,
    ) -> Result<()> {
        let adapter = self.adapter.as_ref().ok_or(WindowError::NoPersistAdapter)?;
        adapter
            .save(config, state, meta)
            .await
            .map_err(|err| WindowError::PersistFailed(format!("Failed to persist state: {err}")))
    }

    pub async fn restore(&self, config: &PersistConfig) -> Result<StateMap> {
        let adapter = self.adapter.as_ref().ok_or(WindowError::NoPersistAdapter)?;
        adapter
            .load(config)
            .await
            .map_err(|err| WindowError::RestoreFailed(format!("Failed to restore state: {err}")))
    }
}
