pub mod rate_plan;
pub mod request;
pub mod savings;
pub mod schedule;
pub mod telemetry;
pub mod types;

pub use rate_plan::*;
pub use request::*;
pub use savings::*;
pub use schedule::*;
pub use telemetry::*;
pub use types::*;
