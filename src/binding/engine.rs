use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::error::{Result, WindowError};
use crate::logging::{BINDING_TARGET, LogLevel, Logger, emit, json_kv};
use crate::metrics::{self, SharedMetrics};
use crate::persist::PersistAdapter;
use crate::registry::WindowDefinition;
use crate::state::{StateMap, StateStore, create_nested_object, get_nested_value};
use crate::sync::RemoteSyncGate;

use super::types::{BindingSource, DEFAULT_DEBOUNCE_MS, NormalizedBinding, SyncPolicy};

struct DebounceTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Keeps window state and binding sources in step.
///
/// Bindings are loaded into the [`StateStore`] when a window initializes and
/// written back to their sources on [`BindingEngine::sync`]. The engine is
/// shared behind an `Arc` so spawned loads and debounce timers can reach it.
pub struct BindingEngine {
    store: Arc<StateStore>,
    adapter: Option<Arc<dyn PersistAdapter>>,
    gate: Arc<RemoteSyncGate>,
    bindings: RwLock<HashMap<String, Vec<NormalizedBinding>>>,
    timers: Mutex<HashMap<String, DebounceTimer>>,
    generation: AtomicU64,
    default_debounce_ms: u64,
    logger: Option<Logger>,
    metrics: Option<SharedMetrics>,
}

impl BindingEngine {
    pub fn new(
        store: Arc<StateStore>,
        adapter: Option<Arc<dyn PersistAdapter>>,
        gate: Arc<RemoteSyncGate>,
    ) -> Self {
        Self {
            store,
            adapter,
            gate,
            bindings: RwLock::new(HashMap::new()),
            timers: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            default_debounce_ms: DEFAULT_DEBOUNCE_MS,
            logger: None,
            metrics: None,
        }
    }

    pub fn with_default_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.default_debounce_ms = debounce_ms;
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

    /// Control bindings and global bindings of `definition`, normalized.
    pub fn get_normalized_bindings(&self, definition: &WindowDefinition) -> Vec<NormalizedBinding> {
        let local = definition.controls.iter().filter_map(|control| {
            control.binding.as_ref().map(|binding| {
                NormalizedBinding::from_descriptor(
                    binding,
                    format!("{}-binding", control.id),
                    true,
                    self.default_debounce_ms,
                )
            })
        });
        let global = definition.bindings.iter().map(|binding| {
            NormalizedBinding::from_descriptor(
                binding,
                format!("{}-binding", binding.source.key()),
                false,
                self.default_debounce_ms,
            )
        });
        local.chain(global).collect()
    }

    /// Registers the definition's bindings for `instance_id` and starts
    /// loading their current values in the background.
    ///
    /// Re-initializing an instance overwrites bindings with the same id.
    /// Loads are best effort; failures are only logged.
    pub fn initialize(self: &Arc<Self>, definition: &WindowDefinition, instance_id: &str) -> Result<()> {
        let normalized = self.get_normalized_bindings(definition);
        {
            let mut bindings = self
                .bindings
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let registered = bindings.entry(instance_id.to_string()).or_default();
            for binding in &normalized {
                match registered.iter_mut().find(|existing| existing.id() == binding.id()) {
                    Some(existing) => *existing = binding.clone(),
                    None => registered.push(binding.clone()),
                }
            }
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            emit(
                self.logger.as_ref(),
                LogLevel::Debug,
                BINDING_TARGET,
                "no async runtime; skipping binding loads",
                [json_kv("instance_id", instance_id)],
            );
            return Ok(());
        };

        for binding in normalized {
            let engine = Arc::clone(self);
            let instance_id = instance_id.to_string();
            runtime.spawn(async move {
                engine.load_into_state(&instance_id, &binding).await;
            });
        }
        Ok(())
    }

    async fn load_into_state(&self, instance_id: &str, binding: &NormalizedBinding) {
        match self.load_value(instance_id, binding).await {
            Ok(Some(value)) => {
                // set never fails
                let _ = self
                    .store
                    .set(instance_id, &binding.target().state_key, value);
            }
            Ok(None) => {}
            Err(err) => emit(
                self.logger.as_ref(),
                LogLevel::Debug,
                BINDING_TARGET,
                "binding load failed",
                [
                    json_kv("instance_id", instance_id),
                    json_kv("binding", binding.id()),
                    json_kv("error", err.to_string()),
                ],
            ),
        }
    }

    /// Reads the current value of a binding's source.
    ///
    /// `Ok(None)` means the source has nothing to offer: a missing state key,
    /// no persist adapter, an empty payload, or a journal source.
    pub async fn load_value(
        &self,
        instance_id: &str,
        binding: &NormalizedBinding,
    ) -> Result<Option<Value>> {
        let source = binding.source();
        match source {
            BindingSource::State { key } => Ok(self.store.get(instance_id, key).ok()),
            BindingSource::Setting { .. } | BindingSource::Flag { .. } => {
                let Some(adapter) = &self.adapter else {
                    return Ok(None);
                };
                let config = source.to_persist_config()?;
                let payload = adapter.load(&config).await.map_err(|err| {
                    WindowError::BindingLoadFailed(format!(
                        "Failed to load {} binding: {err}",
                        source.kind()
                    ))
                })?;
                Ok(resolve_payload(payload, source.key()))
            }
            BindingSource::Journal { .. } => Ok(None),
        }
    }

    /// Writes state back to the sources of the instance's two-way bindings.
    ///
    /// Each binding's own policy wins over `policy`. Immediate saves stop at
    /// the first failure; writes made before it are kept.
    pub async fn sync(self: &Arc<Self>, instance_id: &str, policy: SyncPolicy) -> Result<()> {
        if policy.effective() == SyncPolicy::None {
            return Ok(());
        }

        for binding in self.bindings(instance_id) {
            if !binding.two_way {
                continue;
            }
            let effective = binding.effective_policy(policy);
            if effective == SyncPolicy::None {
                continue;
            }
            let Ok(value) = self.store.get(instance_id, &binding.target().state_key) else {
                continue;
            };

            match effective {
                SyncPolicy::Debounced => self.schedule_debounced(instance_id, binding, value),
                _ => {
                    self.save_value(instance_id, &binding, value).await?;
                    metrics::record(self.metrics.as_ref(), |m| m.record_binding_save(false));
                }
            }
        }
        Ok(())
    }

    /// Cancel-and-replace: a pending write for the same binding is dropped.
    fn schedule_debounced(self: &Arc<Self>, instance_id: &str, binding: NormalizedBinding, value: Value) {
        let timer_key = format!("{instance_id}:{}", binding.id());
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            emit(
                self.logger.as_ref(),
                LogLevel::Warn,
                BINDING_TARGET,
                "no async runtime; debounced write dropped",
                [
                    json_kv("instance_id", instance_id),
                    json_kv("binding", binding.id()),
                ],
            );
            return;
        };
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let delay = Duration::from_millis(binding.debounce_ms);

        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = timers.remove(&timer_key) {
            previous.handle.abort();
        }

        let engine = Arc::clone(self);
        let instance_id = instance_id.to_string();
        let key = timer_key.clone();
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            engine.finish_timer(&key, generation);
            match engine.save_value(&instance_id, &binding, value).await {
                Ok(()) => {
                    metrics::record(engine.metrics.as_ref(), |m| m.record_binding_save(true));
                }
                Err(err) => emit(
                    engine.logger.as_ref(),
                    LogLevel::Warn,
                    BINDING_TARGET,
                    "debounced binding save failed",
                    [
                        json_kv("instance_id", instance_id.as_str()),
                        json_kv("binding", binding.id()),
                        json_kv("error", err.to_string()),
                    ],
                ),
            }
        });
        timers.insert(timer_key, DebounceTimer { generation, handle });
    }

    fn finish_timer(&self, timer_key: &str, generation: u64) {
        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        if timers
            .get(timer_key)
            .is_some_and(|timer| timer.generation == generation)
        {
            timers.remove(timer_key);
        }
    }

    /// Writes `value` to the binding's source.
    pub async fn save_value(
        &self,
        instance_id: &str,
        binding: &NormalizedBinding,
        value: Value,
    ) -> Result<()> {
        let source = binding.source();
        match source {
            BindingSource::State { key } => self.store.set(instance_id, key, value),
            BindingSource::Setting { .. } | BindingSource::Flag { .. } => {
                let Some(adapter) = &self.adapter else {
                    return Ok(());
                };
                let config = source.to_persist_config()?;
                let data = create_nested_object(source.key(), value);
                let meta = self.gate.make_persist_meta(instance_id);
                adapter.save(&config, &data, Some(&meta)).await.map_err(|err| {
                    WindowError::BindingSaveFailed(format!(
                        "Failed to save {} binding: {err}",
                        source.kind()
                    ))
                })
            }
            BindingSource::Journal { .. } => Ok(()),
        }
    }

    /// Aborts the instance's armed debounce timers. Bindings stay registered.
    pub fn cancel_pending(&self, instance_id: &str) {
        let prefix = format!("{instance_id}:");
        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        timers.retain(|key, timer| {
            if key.starts_with(&prefix) {
                timer.handle.abort();
                false
            } else {
                true
            }
        });
    }

    /// Cancels pending debounced writes and forgets the instance's bindings.
    pub fn dispose(&self, instance_id: &str) {
        self.cancel_pending(instance_id);
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(instance_id);
    }

    /// Registered bindings of an instance, in registration order.
    pub fn bindings(&self, instance_id: &str) -> Vec<NormalizedBinding> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(instance_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Debounce timers armed for an instance and not yet fired.
    pub fn pending_debounced(&self, instance_id: &str) -> usize {
        let prefix = format!("{instance_id}:");
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(key, timer)| key.starts_with(&prefix) && !timer.handle.is_finished())
            .count()
    }
}

/// Picks the bound value out of a loaded payload.
///
/// Dotted keys navigate the nested structure; plain keys prefer the value at
/// that key and fall back to the whole payload when it is missing or null.
/// An empty payload yields nothing.
fn resolve_payload(payload: StateMap, key: &str) -> Option<Value> {
    if payload.is_empty() {
        return None;
    }
    if key.contains('.') {
        return get_nested_value(&Value::Object(payload), key).cloned();
    }
    match payload.get(key) {
        Some(value) if !value.is_null() => Some(value.clone()),
        _ => Some(Value::Object(payload)),
    }
}
