mod core;
mod headless;
mod view;

pub use self::core::{Renderer, RendererCoordinator, RendererRegistry};
pub use headless::HeadlessRenderer;
pub use view::{
    BoundAction, ComponentInstance, HostElement, MountPoint, StaticElement, ViewModel,
};
