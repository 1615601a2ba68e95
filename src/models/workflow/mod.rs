pub mod actions;
pub mod queries;
pub mod status;
pub mod timeline;
pub mod transition;

pub use actions::*;
pub use status::*;
pub use timeline::*;
pub use transition::*;
