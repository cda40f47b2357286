use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Indoor/outdoor gap (°F) at which learned rates are expressed.
pub const REFERENCE_DELTA_F: f64 = 20.0;

// Typical residential rates at the reference delta for a 2000 sq ft home
const DEFAULT_COOLING_RATE: f64 = 3.867;
const DEFAULT_HEATING_RATE: f64 = 2.5;
const DEFAULT_DRIFT_RATE: f64 = 1.107;

/// Small parametric model of how a home's temperature responds.
///
/// All rates are °F per hour at the reference delta and never negative.
/// - `cooling_rate`: net pull-down while the compressor runs
/// - `heating_rate`: net rise while the heat runs
/// - `drift_rate`: movement toward outdoor ambient while idle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalModel {
    pub cooling_rate: f64,
    pub heating_rate: f64,
    pub drift_rate: f64,
    pub reference_delta_f: f64,
    /// 0.0 (untrusted) ..= 1.0
    pub confidence: f64,
    pub valid_runs: usize,
    pub last_updated: Option<NaiveDateTime>,
}

impl ThermalModel {
    pub fn new(cooling_rate: f64, heating_rate: f64, drift_rate: f64, confidence: f64) -> Self {
        Self {
            cooling_rate: cooling_rate.max(0.0),
            heating_rate: heating_rate.max(0.0),
            drift_rate: drift_rate.max(0.0),
            reference_delta_f: REFERENCE_DELTA_F,
            confidence: confidence.clamp(0.0, 1.0),
            valid_runs: 0,
            last_updated: None,
        }
    }

    /// Documented fallback model with zero confidence.
    ///
    /// Larger homes respond more slowly: rates scale with `sqrt(2000 / sqft)`,
    /// bounded to [0.6, 1.5] of the typical values.
    pub fn default_for_home(home_size_sqft: f64) -> Self {
        let factor = if home_size_sqft > 0.0 {
            (2000.0 / home_size_sqft).sqrt().clamp(0.6, 1.5)
        } else {
            1.0
        };
        Self::new(
            DEFAULT_COOLING_RATE * factor,
            DEFAULT_HEATING_RATE * factor,
            DEFAULT_DRIFT_RATE * factor,
            0.0,
        )
    }

    pub fn is_trusted(&self, min_confidence: f64) -> bool {
        self.confidence >= min_confidence
    }

    fn clamp_delta(&self, delta: f64) -> f64 {
        delta.clamp(self.reference_delta_f * 0.5, self.reference_delta_f * 2.0)
    }

    /// Net pull-down (°F/h) achievable while cooling against `outdoor_f`.
    pub fn cooling_rate_at(&self, indoor_f: f64, outdoor_f: f64) -> f64 {
        self.cooling_rate * self.reference_delta_f / self.clamp_delta(outdoor_f - indoor_f)
    }

    /// Net rise (°F/h) achievable while heating against `outdoor_f`.
    pub fn heating_rate_at(&self, indoor_f: f64, outdoor_f: f64) -> f64 {
        self.heating_rate * self.reference_delta_f / self.clamp_delta(indoor_f - outdoor_f)
    }

    /// Signed idle drift (°F/h), positive when the home warms.
    pub fn drift_at(&self, indoor_f: f64, outdoor_f: f64) -> f64 {
        self.drift_rate * (outdoor_f - indoor_f) / self.reference_delta_f
    }
}

impl Default for ThermalModel {
    fn default() -> Self {
        Self::default_for_home(2000.0)
    }
}
