pub mod asset;
pub mod colors;
pub mod fleet;
pub mod protocol;

pub use asset::*;
pub use colors::status_color;
pub use fleet::{demo_devices, demo_fleet};
pub use protocol::*;
