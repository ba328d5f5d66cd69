pub mod error;
pub mod math;
pub mod time;

// Foundation crate: small, well-tested primitives only.
pub use error::*;
pub use math::*;
pub use time::*;
