mod core;
mod definition;

pub use self::core::WindowRegistry;
pub use definition::{
    ComponentDescriptor, ControlDescriptor, DependencyDescriptor, WindowDefinition,
    WindowInstance, WindowOverrides,
};
