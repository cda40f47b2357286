use serde::{Deserialize, Serialize};

/// Projected savings of an optimized schedule over the comfort-only baseline,
/// scaled to a rolling window of days. Field names and units are stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsReport {
    pub baseline_cost: f64,
    pub optimized_cost: f64,
    pub savings_amount: f64,
    pub savings_percent: f64,
    /// Kilograms of CO2
    pub co2_avoided: f64,
    pub window_days: u32,
    pub baseline_energy_kwh: f64,
    pub optimized_energy_kwh: f64,
    pub energy_saved_kwh: f64,
    /// Fraction of a passenger car's yearly emissions
    pub cars_equivalent: f64,
}
