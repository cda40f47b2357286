use anyhow::Result;
use chrono::NaiveTime;
use figment::{providers::{Env, Format, Serialized, Toml}, Figment};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::domain::SavingsLevel;
use crate::error::ConfigurationError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub optimizer: OptimizerConfig,
    pub comfort: ComfortConfig,
    pub estimator: EstimatorConfig,
    pub energy: EnergyConfig,
    pub savings: SavingsConfig,
    pub service: ServiceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub slot_minutes: u32,
    pub min_slot_minutes: u32,
    pub quantization_step_f: f64,
    pub max_states: usize,
    pub timeout_ms: u64,
    pub min_model_confidence: f64,
    pub absolute_min_f: f64,
    pub absolute_max_f: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            slot_minutes: 30,
            min_slot_minutes: 5,
            quantization_step_f: 0.5,
            max_states: 20_000,
            timeout_ms: 5_000,
            min_model_confidence: 0.3,
            absolute_min_f: 60.0,
            absolute_max_f: 85.0,
        }
    }
}

/// Comfort band widths (°F) around the target.
///
/// The occupied deadband is the same at every savings level; the level only
/// widens the away band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComfortConfig {
    pub home_half_width: f64,
    pub away_offset_low: f64,
    pub away_offset_medium: f64,
    pub away_offset_high: f64,
}

impl Default for ComfortConfig {
    fn default() -> Self {
        Self {
            home_half_width: 1.4,
            away_offset_low: 2.0,
            away_offset_medium: 6.0,
            away_offset_high: 12.0,
        }
    }
}

impl ComfortConfig {
    pub fn away_half_width(&self, level: SavingsLevel) -> f64 {
        let offset = match level {
            SavingsLevel::Low => self.away_offset_low,
            SavingsLevel::Medium => self.away_offset_medium,
            SavingsLevel::High => self.away_offset_high,
        };
        self.home_half_width + offset
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    pub window_days: u32,
    pub min_run_minutes: i64,
    pub max_sample_gap_minutes: i64,
    pub min_direction_consistency: f64,
    pub reference_delta_f: f64,
    pub min_ambient_gap_f: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            window_days: 14,
            min_run_minutes: 20,
            max_sample_gap_minutes: 15,
            min_direction_consistency: 0.7,
            reference_delta_f: 20.0,
            min_ambient_gap_f: 2.0,
        }
    }
}

/// How the declared home size enters the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeSizeMode {
    /// Scales the HVAC electrical draw only
    Energy,
    /// Scales only the default thermal rates
    DefaultModel,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyConfig {
    pub btu_per_sqft: f64,
    pub seer2: f64,
    pub home_size_mode: HomeSizeMode,
    pub default_outdoor_cool_f: f64,
    pub default_outdoor_heat_f: f64,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            btu_per_sqft: 20.0,
            seer2: 14.0,
            home_size_mode: HomeSizeMode::Both,
            default_outdoor_cool_f: 90.0,
            default_outdoor_heat_f: 35.0,
        }
    }
}

impl EnergyConfig {
    pub const REFERENCE_HOME_SQFT: f64 = 2000.0;

    /// Electrical draw (kW) of equipment sized for the home while running.
    pub fn hvac_power_kw(&self, home_size_sqft: f64) -> f64 {
        let sqft = match self.home_size_mode {
            HomeSizeMode::Energy | HomeSizeMode::Both => home_size_sqft,
            HomeSizeMode::DefaultModel => Self::REFERENCE_HOME_SQFT,
        };
        sqft * self.btu_per_sqft / self.seer2 / 1000.0
    }

    /// Home size handed to the default thermal model.
    pub fn default_model_sqft(&self, home_size_sqft: f64) -> f64 {
        match self.home_size_mode {
            HomeSizeMode::DefaultModel | HomeSizeMode::Both => home_size_sqft,
            HomeSizeMode::Energy => Self::REFERENCE_HOME_SQFT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsConfig {
    pub co2_kg_per_kwh: f64,
    pub car_tonnes_per_year: f64,
    pub window_days: u32,
}

impl Default for SavingsConfig {
    fn default() -> Self {
        Self {
            co2_kg_per_kwh: 0.699,
            car_tonnes_per_year: 4.6,
            window_days: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub nightly_hour: u32,
    pub nightly_minute: u32,
    pub manual_debounce_ms: u64,
    pub telemetry_retention_days: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            nightly_hour: 0,
            nightly_minute: 5,
            manual_debounce_ms: 2_000,
            telemetry_retention_days: 30,
        }
    }
}

impl ServiceConfig {
    /// Local time of the nightly run.
    pub fn nightly_time(&self) -> Result<NaiveTime, ConfigurationError> {
        NaiveTime::from_hms_opt(self.nightly_hour, self.nightly_minute, 0).ok_or_else(|| {
            ConfigurationError::InvalidTime(format!(
                "service.nightly_hour/nightly_minute = {}:{}",
                self.nightly_hour, self.nightly_minute
            ))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` wins when set
    pub filter: String,
    /// JSON lines for log shippers, otherwise human-readable
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,setpoint_optimizer::optimizer=info".to_string(),
            json: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config: Config = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would otherwise only fail, or silently misbehave,
    /// once the daemon is running.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.service.nightly_time()?;

        let opt = &self.optimizer;
        if !(opt.quantization_step_f.is_finite() && opt.quantization_step_f > 0.0) {
            return Err(ConfigurationError::OutOfRange {
                field: "optimizer.quantization_step_f",
                value: opt.quantization_step_f,
                min: f64::MIN_POSITIVE,
                max: f64::MAX,
            });
        }
        if !(opt.absolute_min_f.is_finite() && opt.absolute_max_f.is_finite()) || opt.absolute_min_f >= opt.absolute_max_f {
            return Err(ConfigurationError::OutOfRange {
                field: "optimizer.absolute_min_f",
                value: opt.absolute_min_f,
                min: f64::MIN,
                max: opt.absolute_max_f,
            });
        }

        let comfort = &self.comfort;
        if !(comfort.home_half_width.is_finite() && comfort.home_half_width >= 0.0) {
            return Err(ConfigurationError::OutOfRange {
                field: "comfort.home_half_width",
                value: comfort.home_half_width,
                min: 0.0,
                max: f64::MAX,
            });
        }
        for level in SavingsLevel::iter() {
            let away = comfort.away_half_width(level);
            if !(away.is_finite() && away >= comfort.home_half_width) {
                return Err(ConfigurationError::Validation(format!(
                    "comfort: away band for {level} savings ({away}) is narrower than the home band"
                )));
            }
        }
        Ok(())
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("SETPOINT__").split("__"))
    }
}
