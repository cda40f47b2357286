//! Thermal model estimation from thermostat telemetry.
//!
//! Samples are cut into contiguous runs of one HVAC state, each run is fitted
//! with a least-squares slope, and per-run rates are aggregated with a median
//! so that a few disturbed runs (open windows, defrost cycles) barely move the
//! result.

use chrono::{Duration, NaiveDateTime};
use itertools::Itertools;
use statrs::statistics::{Data, Median};
use tracing::{debug, warn};

use super::ThermalModel;
use crate::config::EstimatorConfig;
use crate::domain::{HvacState, TelemetrySample};
use crate::error::InsufficientDataError;

// Valid runs at which confidence reaches ~63% of its ceiling
const CONFIDENCE_RUN_SCALE: f64 = 12.0;

/// Per-run fit, kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct RunFit {
    pub state: HvacState,
    pub start: NaiveDateTime,
    pub minutes: i64,
    /// Normalized rate (°F/h at the reference delta)
    pub rate: f64,
}

#[derive(Debug, Clone, Default)]
struct Fits {
    cooling: Vec<f64>,
    heating: Vec<f64>,
    drift: Vec<f64>,
}

impl Fits {
    fn total(&self) -> usize {
        self.cooling.len() + self.heating.len() + self.drift.len()
    }
}

pub struct ThermalEstimator {
    config: EstimatorConfig,
    fallback: ThermalModel,
}

impl ThermalEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self {
            config,
            fallback: ThermalModel::default(),
        }
    }

    /// Model returned when no run survives filtering; also supplies any
    /// component (e.g. heating in summer) that has no valid runs.
    pub fn with_fallback(mut self, fallback: ThermalModel) -> Self {
        self.fallback = fallback;
        self
    }

    /// Never fails: degrades to the fallback model with zero confidence.
    pub fn estimate(&self, samples: &[TelemetrySample]) -> ThermalModel {
        match self.try_estimate(samples) {
            Ok(model) => model,
            Err(e) => {
                warn!(
                    samples = e.samples,
                    valid_runs = e.valid_runs,
                    "Not enough usable telemetry, using default thermal model"
                );
                let mut model = self.fallback.clone();
                model.confidence = 0.0;
                model.valid_runs = 0;
                model
            }
        }
    }

    pub fn try_estimate(&self, samples: &[TelemetrySample]) -> Result<ThermalModel, InsufficientDataError> {
        let window = self.recent(samples);
        let fits = self.fit_runs(&window);

        let mut by_state = Fits::default();
        for fit in &fits {
            match fit.state {
                HvacState::Cooling => by_state.cooling.push(fit.rate),
                HvacState::Heating => by_state.heating.push(fit.rate),
                HvacState::Idle => by_state.drift.push(fit.rate),
            }
        }

        let valid_runs = by_state.total();
        if valid_runs == 0 {
            return Err(InsufficientDataError {
                samples: window.len(),
                valid_runs,
            });
        }

        let cooling = median(&by_state.cooling).unwrap_or(self.fallback.cooling_rate);
        let heating = median(&by_state.heating).unwrap_or(self.fallback.heating_rate);
        let drift = median(&by_state.drift).unwrap_or(self.fallback.drift_rate);

        let dispersion = [&by_state.cooling, &by_state.heating, &by_state.drift]
            .into_iter()
            .filter_map(|rates| relative_mad(rates))
            .map(|d| d * d)
            .collect::<Vec<_>>();
        let dispersion = if dispersion.is_empty() {
            0.0
        } else {
            dispersion.iter().sum::<f64>() / dispersion.len() as f64
        };
        let confidence = (1.0 - (-(valid_runs as f64) / CONFIDENCE_RUN_SCALE).exp()) / (1.0 + dispersion);

        let mut model = ThermalModel::new(cooling, heating, drift, confidence);
        model.reference_delta_f = self.config.reference_delta_f;
        model.valid_runs = valid_runs;
        model.last_updated = window.last().map(|s| s.timestamp);

        debug!(
            cooling_runs = by_state.cooling.len(),
            heating_runs = by_state.heating.len(),
            idle_runs = by_state.drift.len(),
            cooling_rate = model.cooling_rate,
            heating_rate = model.heating_rate,
            drift_rate = model.drift_rate,
            confidence = model.confidence,
            "Estimated thermal model"
        );
        Ok(model)
    }

    /// Samples from the last `window_days` before the newest sample, in time order.
    fn recent(&self, samples: &[TelemetrySample]) -> Vec<TelemetrySample> {
        let mut sorted = samples.to_vec();
        sorted.sort_by_key(|s| s.timestamp);
        let Some(newest) = sorted.last().map(|s| s.timestamp) else {
            return sorted;
        };
        let since = newest - Duration::days(i64::from(self.config.window_days));
        sorted.retain(|s| s.timestamp >= since);
        sorted
    }

    /// Splits on state changes and sampling gaps, then fits each run.
    pub fn fit_runs(&self, samples: &[TelemetrySample]) -> Vec<RunFit> {
        let max_gap = Duration::minutes(self.config.max_sample_gap_minutes);
        let mut runs: Vec<&[TelemetrySample]> = Vec::new();
        let mut start = 0;
        for i in 1..=samples.len() {
            let boundary = i == samples.len()
                || samples[i].hvac_state != samples[i - 1].hvac_state
                || samples[i].timestamp - samples[i - 1].timestamp > max_gap;
            if boundary {
                runs.push(&samples[start..i]);
                start = i;
            }
        }

        runs.into_iter().filter_map(|run| self.fit_run(run)).collect()
    }

    fn fit_run(&self, run: &[TelemetrySample]) -> Option<RunFit> {
        let (first, last) = (run.first()?, run.last()?);
        let minutes = (last.timestamp - first.timestamp).num_minutes();
        if run.len() < 2 || minutes < self.config.min_run_minutes {
            return None;
        }

        let slope = least_squares_slope(run)?;
        let mean_indoor = run.iter().map(|s| s.indoor_temperature_f).sum::<f64>() / run.len() as f64;
        let outdoor: Vec<f64> = run.iter().filter_map(|s| s.outdoor_temperature_f).collect();
        let mean_outdoor = (!outdoor.is_empty()).then(|| outdoor.iter().sum::<f64>() / outdoor.len() as f64);
        let reference = self.config.reference_delta_f;
        let clamp_delta = |d: f64| d.clamp(reference * 0.5, reference * 2.0);

        // Expected sign of movement: -1 falling, +1 rising
        let (direction, rate) = match run[0].hvac_state {
            HvacState::Cooling => {
                let rate = -slope;
                let scale = mean_outdoor.map_or(1.0, |out| clamp_delta(out - mean_indoor) / reference);
                (-1.0, rate * scale)
            }
            HvacState::Heating => {
                let scale = mean_outdoor.map_or(1.0, |out| clamp_delta(mean_indoor - out) / reference);
                (1.0, slope * scale)
            }
            HvacState::Idle => match mean_outdoor {
                Some(out) => {
                    let gap = out - mean_indoor;
                    if gap.abs() < self.config.min_ambient_gap_f {
                        return None;
                    }
                    (gap.signum(), slope * reference / gap)
                }
                None => (slope.signum(), slope.abs()),
            },
        };

        if rate <= 0.0 || !rate.is_finite() {
            return None;
        }
        if direction_consistency(run, direction) < self.config.min_direction_consistency {
            return None;
        }

        Some(RunFit {
            state: run[0].hvac_state,
            start: first.timestamp,
            minutes,
            rate,
        })
    }
}

/// Slope (°F/h) of indoor temperature against elapsed time.
fn least_squares_slope(run: &[TelemetrySample]) -> Option<f64> {
    let t0 = run.first()?.timestamp;
    let points: Vec<(f64, f64)> = run
        .iter()
        .map(|s| ((s.timestamp - t0).num_seconds() as f64 / 3600.0, s.indoor_temperature_f))
        .collect();
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|p| (p.0 - mean_x).powi(2)).sum();
    if sxx <= f64::EPSILON {
        return None;
    }
    let sxy: f64 = points.iter().map(|p| (p.0 - mean_x) * (p.1 - mean_y)).sum();
    Some(sxy / sxx)
}

/// Fraction of non-zero sample-to-sample steps moving in `direction`.
fn direction_consistency(run: &[TelemetrySample], direction: f64) -> f64 {
    let (agree, moved) = run
        .iter()
        .tuple_windows()
        .map(|(a, b)| b.indoor_temperature_f - a.indoor_temperature_f)
        .filter(|d| d.abs() > f64::EPSILON)
        .fold((0usize, 0usize), |(agree, moved), d| {
            (agree + usize::from(d.signum() == direction), moved + 1)
        });
    if moved == 0 {
        0.0
    } else {
        agree as f64 / moved as f64
    }
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(Data::new(values.to_vec()).median())
}

/// Median absolute deviation relative to the median.
fn relative_mad(values: &[f64]) -> Option<f64> {
    let m = median(values)?;
    if m <= 0.0 {
        return None;
    }
    let deviations: Vec<f64> = values.iter().map(|v| (v - m).abs()).collect();
    median(&deviations).map(|mad| mad / m)
}
