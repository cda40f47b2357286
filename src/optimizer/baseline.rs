use super::{Deadline, OptimizationStrategy, PlanningProblem};
use crate::domain::Schedule;
use crate::error::PlanningError;

/// "Do nothing smart": hold the comfort target all day.
///
/// Serves as the comparison point for savings. The thermostat is replayed
/// through the same slot physics as the optimizer, so when the target is not
/// reachable from the initial temperature the equipment simply runs flat out.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComfortOnlyBaseline;

impl OptimizationStrategy for ComfortOnlyBaseline {
    fn name(&self) -> &'static str {
        "comfort_baseline"
    }

    fn optimize(&self, problem: &PlanningProblem, deadline: &Deadline) -> Result<Schedule, PlanningError> {
        deadline.check(0, problem.slots.len())?;
        let setpoints = vec![problem.comfort_target_f; problem.slots.len()];
        let steps = problem.simulate(&setpoints);
        Ok(problem.schedule(self.name(), &setpoints, &steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::{DayType, OptimizationRequest, PriceTier, RatePlan, TariffPeriod, TimeOfDay};
    use crate::thermal::ThermalModel;
    use chrono::NaiveDate;

    fn problem(initial: Option<f64>) -> PlanningProblem {
        let plan = RatePlan::year_round(
            "flat",
            "Flat",
            vec![TariffPeriod {
                day_type: DayType::All,
                start: TimeOfDay::MIDNIGHT,
                end: TimeOfDay::END_OF_DAY,
                tier: PriceTier::OffPeak,
                price_per_kwh: 0.2,
            }],
        );
        let mut req = OptimizationRequest::new(
            ThermalModel::new(1.5, 1.0, 0.8, 1.0),
            plan,
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
        )
        .with_assumed_outdoor(95.0);
        req.initial_temperature_f = initial;
        PlanningProblem::build(&req, &Config::default()).unwrap()
    }

    #[test]
    fn test_holds_target_every_slot() {
        let p = problem(None);
        let schedule = ComfortOnlyBaseline.optimize(&p, &Deadline::unbounded()).unwrap();
        assert_eq!(schedule.strategy, "comfort_baseline");
        assert!(schedule.slots.iter().all(|s| s.setpoint_f == 72.0));
        // steady state: same energy every slot
        let first = schedule.slots[0].energy_kwh;
        assert!(first > 0.0);
        assert!(schedule.slots.iter().all(|s| (s.energy_kwh - first).abs() < 1e-12));
    }

    #[test]
    fn test_runs_flat_out_from_hot_start() {
        let p = problem(Some(84.0));
        let schedule = ComfortOnlyBaseline.optimize(&p, &Deadline::unbounded()).unwrap();
        let full = p.physics.hvac_power_kw * 0.5;
        assert!((schedule.slots[0].energy_kwh - full).abs() < 1e-12);
        assert!(schedule.slots[0].expected_temperature_f > 72.0);
        assert!(schedule.slots[47].energy_kwh < full);
        assert_eq!(schedule.slots[47].expected_temperature_f, 72.0);
    }
}
