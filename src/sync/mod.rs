mod bridge;
mod gate;

pub use bridge::{RemoteChangeRouter, is_relevant};
pub use gate::{GAMEMASTER_ROLE, RemoteSyncGate, SessionIdentity, SessionUser, StaticIdentity};
