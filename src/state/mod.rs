pub mod path;
mod port;
mod store;

pub use path::{create_nested_object, get_nested_value};
pub use port::WindowState;
pub use store::{StateMap, StateStore};
