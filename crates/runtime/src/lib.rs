pub mod frame;
pub mod inbox;
pub mod journal;
pub mod metrics;

pub use frame::*;
pub use inbox::*;
pub use journal::*;
pub use metrics::*;
