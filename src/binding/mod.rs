mod engine;
mod types;

pub use engine::BindingEngine;
pub use types::{
    BindingDescriptor, BindingSource, BindingTarget, DEFAULT_DEBOUNCE_MS, NormalizedBinding,
    SyncPolicy,
};
