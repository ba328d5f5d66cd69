pub mod dome;
pub mod transform;

pub use dome::*;
pub use transform::*;
