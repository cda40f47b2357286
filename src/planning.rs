//! Entry points used by collaborators: thermal learning, tariff resolution,
//! schedule optimization and savings evaluation.

use std::time::Duration;

use chrono::NaiveDate;

use crate::config::Config;
use crate::domain::{OptimizationRequest, SavingsReport, Schedule, TelemetrySample};
use crate::error::{ConfigurationError, PlanningError};
use crate::optimizer::{ComfortOnlyBaseline, Deadline, OptimizationStrategy, PlanningProblem, ScheduleOptimizer};
use crate::savings::SavingsCalculator;
use crate::tariff::{PriceFunction, RatePlanCatalog};
use crate::thermal::{ThermalEstimator, ThermalModel};

/// Learns a thermal model from the recent telemetry window.
///
/// Never fails: without usable runs the default model for `home_size_sqft`
/// is returned with zero confidence.
pub fn estimate_thermal_model(telemetry: &[TelemetrySample], home_size_sqft: f64, config: &Config) -> ThermalModel {
    let fallback = ThermalModel::default_for_home(config.energy.default_model_sqft(home_size_sqft));
    ThermalEstimator::new(config.estimator.clone())
        .with_fallback(fallback)
        .estimate(telemetry)
}

/// Resolves a built-in plan (by id or 1-based number) for `date`.
pub fn normalize_rate_plan(rate_plan_id: &str, date: NaiveDate) -> Result<PriceFunction, ConfigurationError> {
    let catalog = RatePlanCatalog::builtin()?;
    PriceFunction::normalize(catalog.get(rate_plan_id)?, date)
}

/// Plans the day under the configured time budget.
pub fn optimize_schedule(request: &OptimizationRequest, config: &Config) -> Result<Schedule, PlanningError> {
    let deadline = Deadline::after(Duration::from_millis(config.optimizer.timeout_ms));
    optimize_schedule_within(request, config, &deadline)
}

pub fn optimize_schedule_within(
    request: &OptimizationRequest,
    config: &Config,
    deadline: &Deadline,
) -> Result<Schedule, PlanningError> {
    let problem = PlanningProblem::build(request, config)?;
    ScheduleOptimizer::default().optimize(&problem, deadline)
}

/// Schedule holding the comfort target all day, on the same slot grid.
pub fn baseline_schedule(request: &OptimizationRequest, config: &Config) -> Result<Schedule, PlanningError> {
    let problem = PlanningProblem::build(request, config)?;
    ComfortOnlyBaseline.optimize(&problem, &Deadline::unbounded())
}

/// Compares `schedule` with `baseline` under the request's thermal model and
/// rate plan, scaled to `window_days`.
pub fn evaluate_savings(
    schedule: &Schedule,
    baseline: &Schedule,
    request: &OptimizationRequest,
    window_days: u32,
    config: &Config,
) -> Result<SavingsReport, ConfigurationError> {
    let problem = PlanningProblem::build(request, config)?;
    Ok(SavingsCalculator::new(config.savings.clone()).evaluate(&problem, schedule, baseline, window_days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PriceTier, SavingsLevel, TimeOfDay};

    fn july_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
    }

    #[test]
    fn test_unknown_plan_is_configuration_error() {
        assert!(matches!(
            normalize_rate_plan("nope", july_first()),
            Err(ConfigurationError::UnknownRatePlan(_))
        ));
        let f = normalize_rate_plan("1", july_first()).unwrap();
        assert_eq!(f.tier_at(TimeOfDay::hm(17, 0).unwrap()), PriceTier::OnPeak);
    }

    #[test]
    fn test_day_one_pipeline() {
        let config = Config::default();
        let model = estimate_thermal_model(&[], 2000.0, &config);
        assert_eq!(model.confidence, 0.0);

        let plan = RatePlanCatalog::builtin().unwrap().get("sdge-tou-dr1").unwrap().clone();
        let request = OptimizationRequest::new(model, plan, july_first()).with_savings_level(SavingsLevel::Medium);
        let schedule = optimize_schedule(&request, &config).unwrap();
        assert!(schedule.validate_partition().is_ok());

        let baseline = baseline_schedule(&request, &config).unwrap();
        let report = evaluate_savings(&schedule, &baseline, &request, 120, &config).unwrap();
        assert!(report.optimized_cost <= report.baseline_cost + 1e-9);
        assert_eq!(report.window_days, 120);
    }
}
