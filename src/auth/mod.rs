pub mod actor;
pub mod role;
pub mod scope;

pub use actor::Actor;
pub use role::{Capabilities, Capability, Role};
