pub mod estimator;
pub mod model;
pub mod store;

pub use estimator::{RunFit, ThermalEstimator};
pub use model::{ThermalModel, REFERENCE_DELTA_F};
pub use store::TelemetryStore;
