pub mod collaborators;
pub mod config;
pub mod events;
pub mod router;
pub mod sim;
pub mod system;

pub use collaborators::*;
pub use config::*;
pub use events::*;
pub use router::*;
pub use system::*;
