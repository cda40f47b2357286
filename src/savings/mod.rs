//! Savings & impact of an optimized schedule versus the comfort-only baseline.
//!
//! Both schedules are replayed through the same slot physics the optimizer
//! used, from the same starting temperature, so the comparison is like for
//! like. One day is taken as representative of every day in the window.

use tracing::debug;

use crate::config::SavingsConfig;
use crate::domain::{Energy, Price, SavingsReport, Schedule};
use crate::optimizer::PlanningProblem;

/// Daily totals of one replayed schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyUsage {
    pub energy: Energy,
    pub cost: f64,
}

pub struct SavingsCalculator {
    config: SavingsConfig,
}

impl SavingsCalculator {
    pub fn new(config: SavingsConfig) -> Self {
        Self { config }
    }

    /// Energy and cost of following `schedule`'s setpoints for one day.
    pub fn replay(problem: &PlanningProblem, schedule: &Schedule) -> DailyUsage {
        let mut temp = problem.initial_temperature();
        let mut energy = Energy::ZERO;
        let mut cost = 0.0;
        for slot in &schedule.slots {
            let hours = f64::from(slot.end_time.minutes() - slot.start_time.minutes()) / 60.0;
            let midpoint = (slot.start_time.hours_f64() + slot.end_time.hours_f64()) / 2.0;
            let outdoor = problem.outdoor.at(midpoint);
            let price = Price::per_kwh(problem.prices.average_price(slot.start_time, slot.end_time));

            let step = problem.physics.replay(temp, slot.setpoint_f, outdoor, hours);
            let slot_energy = Energy::kilowatt_hours(step.transition.energy_kwh);
            energy = energy + slot_energy;
            cost += price * slot_energy;
            temp = step.end_f;
        }
        DailyUsage { energy, cost }
    }

    pub fn evaluate(
        &self,
        problem: &PlanningProblem,
        schedule: &Schedule,
        baseline: &Schedule,
        window_days: u32,
    ) -> SavingsReport {
        let optimized = Self::replay(problem, schedule);
        let base = Self::replay(problem, baseline);
        let report = self.report(base, optimized, window_days);
        debug!(
            window_days,
            baseline_cost = report.baseline_cost,
            optimized_cost = report.optimized_cost,
            savings_percent = report.savings_percent,
            "Savings evaluated"
        );
        report
    }

    /// Scales daily totals to the window and derives the impact figures.
    pub fn report(&self, baseline: DailyUsage, optimized: DailyUsage, window_days: u32) -> SavingsReport {
        let days = f64::from(window_days);
        let baseline_cost = baseline.cost * days;
        let optimized_cost = optimized.cost * days;
        let savings_amount = baseline_cost - optimized_cost;
        let savings_percent = if baseline_cost > 0.0 {
            savings_amount / baseline_cost * 100.0
        } else {
            0.0
        };

        let baseline_energy_kwh = baseline.energy.as_kilowatt_hours() * days;
        let optimized_energy_kwh = optimized.energy.as_kilowatt_hours() * days;
        let energy_saved_kwh = baseline_energy_kwh - optimized_energy_kwh;
        let co2_avoided = energy_saved_kwh * self.config.co2_kg_per_kwh;
        let cars_equivalent = if self.config.car_tonnes_per_year > 0.0 {
            co2_avoided / 1000.0 / self.config.car_tonnes_per_year
        } else {
            0.0
        };

        SavingsReport {
            baseline_cost,
            optimized_cost,
            savings_amount,
            savings_percent,
            co2_avoided,
            window_days,
            baseline_energy_kwh,
            optimized_energy_kwh,
            energy_saved_kwh,
            cars_equivalent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::{DayType, OptimizationRequest, PriceTier, RatePlan, SavingsLevel, TariffPeriod, TimeOfDay};
    use crate::optimizer::{ComfortOnlyBaseline, Deadline, DynamicProgrammingOptimizer, OptimizationStrategy};
    use crate::thermal::ThermalModel;
    use chrono::NaiveDate;

    fn usage(kwh: f64, cost: f64) -> DailyUsage {
        DailyUsage {
            energy: Energy::kilowatt_hours(kwh),
            cost,
        }
    }

    #[test]
    fn test_report_scaling() {
        let calc = SavingsCalculator::new(SavingsConfig::default());
        let r = calc.report(usage(20.0, 4.0), usage(15.0, 3.0), 120);
        assert!((r.baseline_cost - 480.0).abs() < 1e-9);
        assert!((r.optimized_cost - 360.0).abs() < 1e-9);
        assert!((r.savings_amount - 120.0).abs() < 1e-9);
        assert!((r.savings_percent - 25.0).abs() < 1e-9);
        assert!((r.energy_saved_kwh - 600.0).abs() < 1e-9);
        assert!((r.co2_avoided - 600.0 * 0.699).abs() < 1e-9);
        assert!((r.cars_equivalent - 0.4194 / 4.6).abs() < 1e-9);
        assert_eq!(r.window_days, 120);
    }

    #[test]
    fn test_zero_baseline_has_zero_percent() {
        let calc = SavingsCalculator::new(SavingsConfig::default());
        let r = calc.report(usage(0.0, 0.0), usage(0.0, 0.0), 30);
        assert_eq!(r.savings_percent, 0.0);
        assert_eq!(r.savings_amount, 0.0);
    }

    #[test]
    fn test_replay_matches_optimizer_costs() {
        let t = |h| TimeOfDay::hm(h, 0).unwrap();
        let p = |start, end, tier, price| TariffPeriod {
            day_type: DayType::All,
            start,
            end,
            tier,
            price_per_kwh: price,
        };
        let plan = RatePlan::year_round(
            "peak",
            "Peak",
            vec![
                p(TimeOfDay::MIDNIGHT, t(16), PriceTier::OffPeak, 0.12),
                p(t(16), t(21), PriceTier::OnPeak, 0.45),
                p(t(21), TimeOfDay::END_OF_DAY, PriceTier::OffPeak, 0.12),
            ],
        );
        let req = OptimizationRequest::new(
            ThermalModel::new(1.5, 1.0, 0.8, 1.0),
            plan,
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
        )
        .with_savings_level(SavingsLevel::Medium)
        .with_assumed_outdoor(95.0);
        let problem = PlanningProblem::build(&req, &Config::default()).unwrap();
        let optimized = DynamicProgrammingOptimizer.optimize(&problem, &Deadline::unbounded()).unwrap();
        let baseline = ComfortOnlyBaseline.optimize(&problem, &Deadline::unbounded()).unwrap();

        let replayed = SavingsCalculator::replay(&problem, &optimized);
        assert!((replayed.cost - optimized.projected_cost).abs() < 1e-9);
        let replayed = SavingsCalculator::replay(&problem, &baseline);
        assert!((replayed.cost - baseline.projected_cost).abs() < 1e-9);

        let report = SavingsCalculator::new(SavingsConfig::default()).evaluate(&problem, &optimized, &baseline, 120);
        assert!(report.savings_amount > 0.0);
        assert!(report.optimized_cost <= report.baseline_cost);
    }
}
