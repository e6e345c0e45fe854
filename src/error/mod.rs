mod types;

pub use types::{PermissionDenial, PersistError, Result, WindowError};
