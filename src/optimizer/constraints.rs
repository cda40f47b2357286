use serde::{Deserialize, Serialize};

use crate::config::{ComfortConfig, OptimizerConfig};
use crate::domain::{OptimizationRequest, TimeOfDay};

// Tolerance for grid temperatures sitting exactly on a band edge
const EDGE_EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComfortBand {
    pub low_f: f64,
    pub high_f: f64,
}

impl ComfortBand {
    pub fn new(low_f: f64, high_f: f64) -> Self {
        Self { low_f, high_f }
    }

    pub fn around(target_f: f64, half_width_f: f64) -> Self {
        Self::new(target_f - half_width_f, target_f + half_width_f)
    }

    /// Intersection with `[min_f, max_f]`; may come out empty.
    pub fn clamp(self, min_f: f64, max_f: f64) -> Self {
        Self::new(self.low_f.max(min_f), self.high_f.min(max_f))
    }

    pub fn is_empty(&self) -> bool {
        self.low_f > self.high_f + EDGE_EPS
    }

    pub fn contains(&self, temp_f: f64) -> bool {
        temp_f >= self.low_f - EDGE_EPS && temp_f <= self.high_f + EDGE_EPS
    }
}

/// Comfort limits for one request.
///
/// The band applies to the temperature at an instant: a slot's end state is
/// checked against the band in force at the slot's end time, so the home is
/// back inside the occupied band when the occupants return.
#[derive(Debug, Clone, PartialEq)]
pub struct ComfortPolicy {
    pub target_f: f64,
    pub home_half_width_f: f64,
    pub away_half_width_f: f64,
    pub absolute_min_f: f64,
    pub absolute_max_f: f64,
}

impl ComfortPolicy {
    pub fn for_request(request: &OptimizationRequest, comfort: &ComfortConfig, limits: &OptimizerConfig) -> Self {
        Self {
            target_f: request.comfort_target_f,
            home_half_width_f: comfort.home_half_width,
            away_half_width_f: comfort.away_half_width(request.savings_level),
            absolute_min_f: limits.absolute_min_f,
            absolute_max_f: limits.absolute_max_f,
        }
    }

    /// Band at instant `t` and whether the home counts as occupied then.
    ///
    /// A custom comfort schedule on the request replaces the occupancy bands.
    pub fn band_at(&self, request: &OptimizationRequest, t: TimeOfDay) -> (ComfortBand, bool) {
        let occupied = !request.is_away(t);
        let band = match &request.custom_comfort {
            Some(custom) => {
                let (lo, hi) = custom.band_at(t);
                ComfortBand::new(lo, hi)
            }
            None if occupied => ComfortBand::around(self.target_f, self.home_half_width_f),
            None => ComfortBand::around(self.target_f, self.away_half_width_f),
        };
        (band.clamp(self.absolute_min_f, self.absolute_max_f), occupied)
    }
}
