pub mod compositor;
pub mod fisheye;
pub mod frame;
pub mod layout;
pub mod settings;
pub mod validate;

pub use compositor::*;
pub use fisheye::*;
pub use frame::*;
pub use layout::*;
pub use settings::*;
pub use validate::*;
