pub mod catalog;
pub mod normalizer;

pub use catalog::{validate_plan, RatePlanCatalog};
pub use normalizer::{PriceFunction, PricePeriod};
