use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// What the HVAC equipment was actually doing when the sample was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum HvacState {
    Heating,
    Cooling,
    Idle,
}

/// One periodic reading from the thermostat. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub timestamp: NaiveDateTime,
    pub indoor_temperature_f: f64,
    pub hvac_state: HvacState,
    pub active_setpoint_f: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outdoor_temperature_f: Option<f64>,
}

impl TelemetrySample {
    pub fn new(
        timestamp: NaiveDateTime,
        indoor_temperature_f: f64,
        hvac_state: HvacState,
        active_setpoint_f: f64,
    ) -> Self {
        Self {
            timestamp,
            indoor_temperature_f,
            hvac_state,
            active_setpoint_f,
            outdoor_temperature_f: None,
        }
    }

    pub fn with_outdoor(mut self, outdoor_f: f64) -> Self {
        self.outdoor_temperature_f = Some(outdoor_f);
        self
    }
}
