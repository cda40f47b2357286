use serde::Serialize;
use thiserror::Error;

use crate::domain::TimeOfDay;

/// Rejected inputs: bad rate plans, out-of-range request fields, bad config.
///
/// Always raised while a request or plan is being constructed, never once the
/// search has started.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("unknown rate plan: {0}")]
    UnknownRatePlan(String),

    #[error("malformed rate plan {plan_id}: {reason}")]
    MalformedRatePlan { plan_id: String, reason: String },

    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("invalid time of day: {0}")]
    InvalidTime(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("invalid custom comfort schedule: {0}")]
    CustomSchedule(String),

    #[error("slot width {slot_minutes} min is below the {min_minutes} min floor required by the tariff boundaries")]
    SlotResolution { slot_minutes: u32, min_minutes: u32 },

    #[error("state space of {states} exceeds the configured limit of {limit}")]
    StateSpace { states: usize, limit: usize },
}

impl From<validator::ValidationErrors> for ConfigurationError {
    fn from(e: validator::ValidationErrors) -> Self {
        Self::Validation(e.to_string())
    }
}

/// Not enough usable telemetry to learn a thermal model.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("insufficient telemetry: {samples} samples, {valid_runs} valid runs")]
pub struct InsufficientDataError {
    pub samples: usize,
    pub valid_runs: usize,
}

/// The constraint that could not be satisfied first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolatedConstraint {
    /// The comfort band does not intersect the absolute bounds.
    EmptyComfortBand { low_f: f64, high_f: f64 },
    /// No reachable temperature state lands inside the band.
    UnreachableComfortBand { low_f: f64, high_f: f64 },
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("no feasible schedule: slot {slot_index} starting {slot_start} violates {constraint:?}")]
pub struct InfeasibleScheduleError {
    pub slot_index: usize,
    pub slot_start: TimeOfDay,
    pub constraint: ViolatedConstraint,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanningError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Infeasible(#[from] InfeasibleScheduleError),

    #[error("search exceeded its {budget_ms} ms budget after {slots_completed}/{slots_total} slots")]
    Timeout {
        budget_ms: u64,
        slots_completed: usize,
        slots_total: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TelemetryError {
    #[error("sample at {got} is older than the last recorded sample at {last}")]
    OutOfOrder {
        last: chrono::NaiveDateTime,
        got: chrono::NaiveDateTime,
    },
}

/// Errors surfaced by the run coordinator.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Planning(#[from] PlanningError),

    #[error("an optimization run for home {0} is already in flight")]
    Busy(String),

    #[error("manual run for home {home_id} ignored, previous request {elapsed_ms} ms ago")]
    Debounced { home_id: String, elapsed_ms: u64 },

    #[error("unknown home: {0}")]
    UnknownHome(String),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error("optimization task failed: {0}")]
    Join(String),
}

impl From<ConfigurationError> for ServiceError {
    fn from(e: ConfigurationError) -> Self {
        Self::Planning(PlanningError::Configuration(e))
    }
}
