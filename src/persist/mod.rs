mod adapter;
mod types;

pub use adapter::{
    ChangeNotification, ChangeTarget, MemoryPersistAdapter, PersistAdapter, PersistResult,
    SavedWrite,
};
pub use types::{ORIGIN_META_KEY, PersistConfig, PersistMeta, PersistTarget, extract_persist_meta};
