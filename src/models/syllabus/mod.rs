pub mod queries;
pub mod readiness;
pub mod types;

pub use queries::*;
pub use types::*;
