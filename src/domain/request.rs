use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use validator::Validate;

use super::{RatePlan, TimeOfDay, MINUTES_PER_DAY};
use crate::error::ConfigurationError;
use crate::thermal::ThermalModel;

/// Coarse comfort/savings trade-off knob.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SavingsLevel {
    Low,
    Medium,
    High,
}

impl SavingsLevel {
    /// Numeric level (1..=3) as entered in the settings form.
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Low),
            2 => Some(Self::Medium),
            3 => Some(Self::High),
            _ => None,
        }
    }
}

/// Which direction the equipment is allowed to push the temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ConditioningMode {
    Cool,
    Heat,
}

/// User-drawn comfort band per fixed interval, replacing the occupancy bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomComfortSchedule {
    pub interval_minutes: u32,
    pub low_f: Vec<f64>,
    pub high_f: Vec<f64>,
}

impl CustomComfortSchedule {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.interval_minutes == 0 || MINUTES_PER_DAY % self.interval_minutes != 0 {
            return Err(ConfigurationError::CustomSchedule(format!(
                "interval of {} minutes does not divide the day",
                self.interval_minutes
            )));
        }
        let expected = (MINUTES_PER_DAY / self.interval_minutes) as usize;
        if self.low_f.len() != expected || self.high_f.len() != expected {
            return Err(ConfigurationError::CustomSchedule(format!(
                "expected {expected} intervals, got {} low / {} high",
                self.low_f.len(),
                self.high_f.len()
            )));
        }
        if let Some(i) = self.low_f.iter().zip(&self.high_f).position(|(lo, hi)| lo > hi) {
            return Err(ConfigurationError::CustomSchedule(format!(
                "interval {i} has low {} above high {}",
                self.low_f[i], self.high_f[i]
            )));
        }
        Ok(())
    }

    /// Band for the interval containing instant `t` (`24:00` wraps to the
    /// first interval). Only meaningful once `validate` has passed.
    pub fn band_at(&self, t: TimeOfDay) -> (f64, f64) {
        let idx = (t.normalized().minutes() / self.interval_minutes) as usize;
        (self.low_f[idx], self.high_f[idx])
    }
}

/// Everything one optimization run needs. Built fresh per run, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct OptimizationRequest {
    pub thermal_model: ThermalModel,
    pub rate_plan: RatePlan,
    /// Calendar date being planned; selects season and weekday/weekend
    pub date: NaiveDate,
    #[validate(range(min = 40.0, max = 100.0))]
    pub comfort_target_f: f64,
    #[validate(range(min = 200.0, max = 20000.0))]
    pub home_size_sqft: f64,
    pub away_time: TimeOfDay,
    pub home_time: TimeOfDay,
    pub savings_level: SavingsLevel,
    pub mode: ConditioningMode,
    /// Hourly outdoor temperatures for hours 0..23 of `date`
    #[validate(length(min = 1, max = 48))]
    pub weather_forecast: Option<Vec<f64>>,
    /// Static outdoor assumption used when no forecast is supplied
    pub assumed_outdoor_f: Option<f64>,
    /// Indoor temperature at 00:00; defaults to the comfort target
    pub initial_temperature_f: Option<f64>,
    pub custom_comfort: Option<CustomComfortSchedule>,
}

impl OptimizationRequest {
    /// Request with the defaults of a fresh installation: 72°F, 2000 sq ft,
    /// away 08:00-17:00, low savings, cooling.
    pub fn new(thermal_model: ThermalModel, rate_plan: RatePlan, date: NaiveDate) -> Self {
        Self {
            thermal_model,
            rate_plan,
            date,
            comfort_target_f: 72.0,
            home_size_sqft: 2000.0,
            away_time: TimeOfDay::hm(8, 0).unwrap_or(TimeOfDay::MIDNIGHT),
            home_time: TimeOfDay::hm(17, 0).unwrap_or(TimeOfDay::MIDNIGHT),
            savings_level: SavingsLevel::Low,
            mode: ConditioningMode::Cool,
            weather_forecast: None,
            assumed_outdoor_f: None,
            initial_temperature_f: None,
            custom_comfort: None,
        }
    }

    pub fn with_comfort_target(mut self, target_f: f64) -> Self {
        self.comfort_target_f = target_f;
        self
    }

    pub fn with_home_size(mut self, sqft: f64) -> Self {
        self.home_size_sqft = sqft;
        self
    }

    pub fn with_occupancy(mut self, away: TimeOfDay, home: TimeOfDay) -> Self {
        self.away_time = away;
        self.home_time = home;
        self
    }

    pub fn with_savings_level(mut self, level: SavingsLevel) -> Self {
        self.savings_level = level;
        self
    }

    pub fn with_mode(mut self, mode: ConditioningMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_forecast(mut self, hourly_outdoor_f: Vec<f64>) -> Self {
        self.weather_forecast = Some(hourly_outdoor_f);
        self
    }

    pub fn with_assumed_outdoor(mut self, outdoor_f: f64) -> Self {
        self.assumed_outdoor_f = Some(outdoor_f);
        self
    }

    pub fn with_initial_temperature(mut self, indoor_f: f64) -> Self {
        self.initial_temperature_f = Some(indoor_f);
        self
    }

    pub fn with_custom_comfort(mut self, custom: CustomComfortSchedule) -> Self {
        self.custom_comfort = Some(custom);
        self
    }

    /// Whether `t` falls inside the away window.
    pub fn is_away(&self, t: TimeOfDay) -> bool {
        t.within(self.away_time, self.home_time)
    }

    /// Static validation plus the absolute comfort bounds in force.
    pub fn check(&self, absolute_min_f: f64, absolute_max_f: f64) -> Result<(), ConfigurationError> {
        self.validate()?;
        let scalars = [
            ("comfort_target_f", Some(self.comfort_target_f)),
            ("home_size_sqft", Some(self.home_size_sqft)),
            ("assumed_outdoor_f", self.assumed_outdoor_f),
            ("initial_temperature_f", self.initial_temperature_f),
        ];
        if let Some((field, value)) = scalars
            .into_iter()
            .find_map(|(field, value)| value.filter(|v| !v.is_finite()).map(|v| (field, v)))
        {
            return Err(ConfigurationError::Validation(format!("{field} must be finite, got {value}")));
        }
        let model = &self.thermal_model;
        for (field, value, min, max) in [
            ("thermal_model.cooling_rate", model.cooling_rate, 0.0, f64::MAX),
            ("thermal_model.heating_rate", model.heating_rate, 0.0, f64::MAX),
            ("thermal_model.drift_rate", model.drift_rate, 0.0, f64::MAX),
            ("thermal_model.reference_delta_f", model.reference_delta_f, f64::MIN_POSITIVE, f64::MAX),
            ("thermal_model.confidence", model.confidence, 0.0, 1.0),
        ] {
            if !(min..=max).contains(&value) {
                return Err(ConfigurationError::OutOfRange { field, value, min, max });
            }
        }
        if !(absolute_min_f..=absolute_max_f).contains(&self.comfort_target_f) {
            return Err(ConfigurationError::OutOfRange {
                field: "comfort_target_f",
                value: self.comfort_target_f,
                min: absolute_min_f,
                max: absolute_max_f,
            });
        }
        if let Some(t) = self.initial_temperature_f {
            if !(30.0..=120.0).contains(&t) {
                return Err(ConfigurationError::OutOfRange {
                    field: "initial_temperature_f",
                    value: t,
                    min: 30.0,
                    max: 120.0,
                });
            }
        }
        if let Some(forecast) = &self.weather_forecast {
            if let Some(bad) = forecast.iter().find(|v| !v.is_finite()) {
                return Err(ConfigurationError::Validation(format!(
                    "weather forecast contains non-finite value {bad}"
                )));
            }
        }
        if let Some(custom) = &self.custom_comfort {
            custom.validate()?;
        }
        Ok(())
    }
}
