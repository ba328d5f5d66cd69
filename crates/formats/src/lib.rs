pub mod coordinate;
pub mod metadata;
pub mod navigation_state;
pub mod settings;

pub use coordinate::*;
pub use metadata::*;
pub use navigation_state::*;
pub use settings::*;
