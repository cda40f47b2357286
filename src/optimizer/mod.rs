pub mod baseline;
pub mod constraints;
pub mod dp;
pub mod physics;
pub mod problem;
pub mod types;

pub use baseline::*;
pub use constraints::*;
pub use dp::*;
pub use physics::*;
pub use problem::*;
pub use types::*;
