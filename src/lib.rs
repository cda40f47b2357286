//! Thermal-aware thermostat setpoint planning under time-of-use tariffs.

pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod optimizer;
pub mod planning;
pub mod savings;
pub mod tariff;
pub mod telemetry;
pub mod thermal;

pub use planning::{baseline_schedule, estimate_thermal_model, evaluate_savings, normalize_rate_plan, optimize_schedule};
