use chrono::NaiveDate;
use tracing::{debug, warn};

use super::{ComfortBand, ComfortPolicy, SlotPhysics, SlotStep};
use crate::config::Config;
use crate::domain::{
    ConditioningMode, OptimizationRequest, PriceTier, Schedule, ScheduleSlot, TimeOfDay, MINUTES_PER_DAY,
};
use crate::error::ConfigurationError;
use crate::tariff::PriceFunction;
use crate::thermal::ThermalModel;

/// Quantized indoor temperatures, anchored so that the comfort target is
/// always a grid point.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureGrid {
    anchor_f: f64,
    step_f: f64,
    k_min: i64,
    len: usize,
}

impl TemperatureGrid {
    /// Grid covering `[min_f, max_f]` plus `extra_f` (rounded onto the grid).
    pub fn covering(anchor_f: f64, step_f: f64, min_f: f64, max_f: f64, extra_f: f64) -> Self {
        let k = |t: f64| (t - anchor_f) / step_f;
        let k_extra = k(extra_f).round() as i64;
        let k_min = (k(min_f).ceil() as i64).min(k_extra);
        let k_max = (k(max_f).floor() as i64).max(k_extra);
        Self {
            anchor_f,
            step_f,
            k_min,
            len: (k_max - k_min + 1).max(0) as usize,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn step(&self) -> f64 {
        self.step_f
    }

    pub fn value(&self, index: usize) -> f64 {
        self.anchor_f + (self.k_min + index as i64) as f64 * self.step_f
    }

    /// Index of the grid point nearest `temp_f`, if inside the grid.
    pub fn index_of(&self, temp_f: f64) -> Option<usize> {
        let k = ((temp_f - self.anchor_f) / self.step_f).round() as i64 - self.k_min;
        (0..self.len as i64).contains(&k).then_some(k as usize)
    }
}

/// Outdoor temperature across the planned day.
#[derive(Debug, Clone, PartialEq)]
pub enum OutdoorProfile {
    Constant(f64),
    /// Values for hours 0, 1, 2, ... of the day, linearly interpolated
    Hourly(Vec<f64>),
}

impl OutdoorProfile {
    pub fn at(&self, hours: f64) -> f64 {
        match self {
            Self::Constant(v) => *v,
            Self::Hourly(values) => {
                let Some(last) = values.last() else {
                    return f64::NAN;
                };
                let i = hours.floor().max(0.0) as usize;
                if i + 1 >= values.len() {
                    return *last;
                }
                let frac = hours - i as f64;
                values[i] + (values[i + 1] - values[i]) * frac
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSlot {
    pub index: usize,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub hours: f64,
    pub outdoor_f: f64,
    pub price_per_kwh: f64,
    pub tier: PriceTier,
    /// Limits on the temperature at the slot end
    pub band: ComfortBand,
    pub occupied: bool,
}

/// Everything the search needs, resolved from a request and configuration.
#[derive(Debug, Clone)]
pub struct PlanningProblem {
    pub plan_id: String,
    pub date: NaiveDate,
    pub mode: ConditioningMode,
    pub comfort_target_f: f64,
    pub slot_minutes: u32,
    pub slots: Vec<PlannedSlot>,
    pub grid: TemperatureGrid,
    pub initial_state: usize,
    pub physics: SlotPhysics,
    pub prices: PriceFunction,
    pub outdoor: OutdoorProfile,
    /// Whether the request's model was too uncertain and the default was used
    pub model_fallback: bool,
}

impl PlanningProblem {
    pub fn build(request: &OptimizationRequest, config: &Config) -> Result<Self, ConfigurationError> {
        let prices = PriceFunction::normalize(&request.rate_plan, request.date)?;
        Self::with_prices(request, prices, config)
    }

    pub fn with_prices(
        request: &OptimizationRequest,
        prices: PriceFunction,
        config: &Config,
    ) -> Result<Self, ConfigurationError> {
        let opt = &config.optimizer;
        request.check(opt.absolute_min_f, opt.absolute_max_f)?;
        if opt.quantization_step_f.is_nan() || opt.quantization_step_f <= 0.0 {
            return Err(ConfigurationError::OutOfRange {
                field: "quantization_step_f",
                value: opt.quantization_step_f,
                min: f64::MIN_POSITIVE,
                max: f64::MAX,
            });
        }

        let slot_minutes = slot_width(opt.slot_minutes, &prices);
        if slot_minutes < opt.min_slot_minutes.max(1) {
            return Err(ConfigurationError::SlotResolution {
                slot_minutes,
                min_minutes: opt.min_slot_minutes,
            });
        }

        let target = request.comfort_target_f;
        let initial = request.initial_temperature_f.unwrap_or(target);
        let grid = TemperatureGrid::covering(target, opt.quantization_step_f, opt.absolute_min_f, opt.absolute_max_f, initial);
        let n_slots = (MINUTES_PER_DAY / slot_minutes) as usize;
        let states = grid.len() * n_slots;
        if states > opt.max_states {
            return Err(ConfigurationError::StateSpace {
                states,
                limit: opt.max_states,
            });
        }
        let initial_state = grid
            .index_of(initial)
            .ok_or_else(|| ConfigurationError::Validation(format!("initial temperature {initial} is off the grid")))?;

        let model_fallback = !request.thermal_model.is_trusted(opt.min_model_confidence);
        let model = if model_fallback {
            warn!(
                confidence = request.thermal_model.confidence,
                min_confidence = opt.min_model_confidence,
                "Thermal model confidence too low, planning with the default model"
            );
            ThermalModel::default_for_home(config.energy.default_model_sqft(request.home_size_sqft))
        } else {
            request.thermal_model.clone()
        };
        let physics = SlotPhysics::new(model, request.mode, config.energy.hvac_power_kw(request.home_size_sqft));

        let outdoor = match (&request.weather_forecast, request.assumed_outdoor_f) {
            (Some(hourly), _) => OutdoorProfile::Hourly(hourly.clone()),
            (None, Some(v)) => OutdoorProfile::Constant(v),
            (None, None) => OutdoorProfile::Constant(match request.mode {
                ConditioningMode::Cool => config.energy.default_outdoor_cool_f,
                ConditioningMode::Heat => config.energy.default_outdoor_heat_f,
            }),
        };

        let policy = ComfortPolicy::for_request(request, &config.comfort, opt);
        let slots = (0..n_slots)
            .map(|index| {
                let start = TimeOfDay::from_minutes(index as u32 * slot_minutes)?;
                let end = TimeOfDay::from_minutes((index as u32 + 1) * slot_minutes)?;
                let (band, occupied) = policy.band_at(request, end);
                Ok::<_, ConfigurationError>(PlannedSlot {
                    index,
                    start,
                    end,
                    hours: f64::from(slot_minutes) / 60.0,
                    outdoor_f: outdoor.at((start.hours_f64() + end.hours_f64()) / 2.0),
                    price_per_kwh: prices.average_price(start, end),
                    tier: prices.tier_at(start),
                    band,
                    occupied,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            plan_id = %prices.plan_id,
            season = %prices.season,
            slot_minutes,
            slots = slots.len(),
            grid_states = grid.len(),
            model_fallback,
            "Planning problem built"
        );

        Ok(Self {
            plan_id: request.rate_plan.plan_id.clone(),
            date: request.date,
            mode: request.mode,
            comfort_target_f: target,
            slot_minutes,
            slots,
            grid,
            initial_state,
            physics,
            prices,
            outdoor,
            model_fallback,
        })
    }

    pub fn initial_temperature(&self) -> f64 {
        self.grid.value(self.initial_state)
    }

    /// Runs the thermostat through the day from the initial temperature,
    /// holding `setpoints[i]` during slot `i`.
    pub fn simulate(&self, setpoints: &[f64]) -> Vec<SlotStep> {
        let mut temp = self.initial_temperature();
        self.slots
            .iter()
            .zip(setpoints)
            .map(|(slot, &setpoint_f)| {
                let step = self.physics.replay(temp, setpoint_f, slot.outdoor_f, slot.hours);
                temp = step.end_f;
                step
            })
            .collect()
    }

    /// Assembles a schedule from per-slot setpoints and their simulated steps.
    pub fn schedule(&self, strategy: &str, setpoints: &[f64], steps: &[SlotStep]) -> Schedule {
        let slots: Vec<ScheduleSlot> = self
            .slots
            .iter()
            .zip(setpoints.iter().zip(steps))
            .map(|(slot, (&setpoint_f, step))| ScheduleSlot {
                start_time: slot.start,
                end_time: slot.end,
                setpoint_f,
                expected_temperature_f: step.end_f,
                expected_price_tier: slot.tier,
                price_per_kwh: slot.price_per_kwh,
                comfort_low_f: slot.band.low_f,
                comfort_high_f: slot.band.high_f,
                occupied: slot.occupied,
                energy_kwh: step.transition.energy_kwh,
                cost: step.transition.energy_kwh * slot.price_per_kwh,
            })
            .collect();
        let projected_energy_kwh = slots.iter().map(|s| s.energy_kwh).sum();
        let projected_cost = slots.iter().map(|s| s.cost).sum();
        Schedule {
            plan_id: self.plan_id.clone(),
            date: self.date,
            mode: self.mode,
            comfort_target_f: self.comfort_target_f,
            slot_minutes: self.slot_minutes,
            strategy: strategy.to_string(),
            slots,
            projected_energy_kwh,
            projected_cost,
        }
    }
}

/// Widest slot that divides the day, the configured width and every tariff
/// boundary, so no slot straddles a price change.
fn slot_width(slot_minutes: u32, prices: &PriceFunction) -> u32 {
    prices
        .boundaries()
        .iter()
        .map(|b| b.minutes())
        .fold(gcd(slot_minutes, MINUTES_PER_DAY), gcd)
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}
