use tracing::{debug, trace};

use super::{Deadline, OptimizationStrategy, PlanningProblem};
use crate::domain::Schedule;
use crate::error::{InfeasibleScheduleError, PlanningError, ViolatedConstraint};

// Costs closer than this are treated as equal and the comfort tie-break decides
const COST_EPS: f64 = 1e-9;

/// Accumulated path quality at a (slot boundary, temperature) state.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Label {
    cost: f64,
    /// Sum of |T - target| over slot-end temperatures so far
    discomfort: f64,
}

impl Label {
    const START: Label = Label {
        cost: 0.0,
        discomfort: 0.0,
    };

    /// Strictly better: cheaper, or as cheap and closer to the target.
    /// Equal labels keep the incumbent so results are order-stable.
    fn beats(&self, other: &Label) -> bool {
        if (self.cost - other.cost).abs() > COST_EPS {
            self.cost < other.cost
        } else {
            self.discomfort < other.discomfort - COST_EPS
        }
    }
}

/// Setpoint `setpoint` held from the boundary `from_slot` at grid state
/// `from_state` until the home reached it (or the day ended).
#[derive(Debug, Clone, Copy)]
struct Hold {
    from_slot: usize,
    from_state: usize,
    setpoint: usize,
}

fn relax(slot: &mut Option<(Label, Hold)>, label: Label, hold: Hold) {
    let better = match slot {
        Some((existing, _)) => label.beats(existing),
        None => true,
    };
    if better {
        *slot = Some((label, hold));
    }
}

/// Shortest path over (slot boundary, quantized indoor temperature).
///
/// An edge holds one grid setpoint from a state until the thermostat reaches
/// it, replaying the slot physics on the way, so a move that takes several
/// slots (slow drift, weak equipment) is followed slot by slot instead of
/// being rounded onto the grid. Every slot end along the edge must lie in
/// that slot's comfort band, and so must the setpoint. Pre-cooling ahead of
/// expensive periods falls out of the cost minimization.
pub struct DynamicProgrammingOptimizer;

impl OptimizationStrategy for DynamicProgrammingOptimizer {
    fn name(&self) -> &'static str {
        "dynamic_programming"
    }

    fn optimize(&self, problem: &PlanningProblem, deadline: &Deadline) -> Result<Schedule, PlanningError> {
        let n = problem.slots.len();
        let states = problem.grid.len();
        let target = problem.comfort_target_f;

        if let Some(slot) = problem.slots.iter().find(|s| s.band.is_empty()) {
            return Err(InfeasibleScheduleError {
                slot_index: slot.index,
                slot_start: slot.start,
                constraint: ViolatedConstraint::EmptyComfortBand {
                    low_f: slot.band.low_f,
                    high_f: slot.band.high_f,
                },
            }
            .into());
        }

        // dp[t][s]: best way to stand at grid state s at the start of slot t
        let mut dp: Vec<Vec<Option<(Label, Hold)>>> = vec![vec![None; states]; n + 1];
        // best way to finish the day still short of the last setpoint
        let mut unsettled: Option<(Label, Hold)> = None;
        // first slot no path has yet ended inside its band
        let mut frontier = 0;
        let mut start = vec![None; states];
        start[problem.initial_state] = Some(Label::START);

        for t in 0..n {
            deadline.check(t, n)?;

            let mut expanded = 0usize;
            for from_state in 0..states {
                let origin = if t == 0 {
                    start[from_state]
                } else {
                    dp[t][from_state].map(|(label, _)| label)
                };
                let Some(origin) = origin else {
                    continue;
                };
                expanded += 1;
                let from_f = problem.grid.value(from_state);

                for setpoint in 0..states {
                    let setpoint_f = problem.grid.value(setpoint);
                    let hold = Hold {
                        from_slot: t,
                        from_state,
                        setpoint,
                    };
                    let mut temp = from_f;
                    let mut label = origin;
                    for (j, slot) in problem.slots.iter().enumerate().skip(t) {
                        if !slot.band.contains(setpoint_f) {
                            break;
                        }
                        let step = problem.physics.replay(temp, setpoint_f, slot.outdoor_f, slot.hours);
                        if !slot.band.contains(step.end_f) {
                            break;
                        }
                        frontier = frontier.max(j + 1);
                        label = Label {
                            cost: label.cost + step.transition.energy_kwh * slot.price_per_kwh,
                            discomfort: label.discomfort + (step.end_f - target).abs(),
                        };
                        temp = step.end_f;
                        if step.reached {
                            relax(&mut dp[j + 1][setpoint], label, hold);
                            break;
                        }
                        if j + 1 == n {
                            relax(&mut unsettled, label, hold);
                        }
                    }
                }
            }
            trace!(slot = t, start = %problem.slots[t].start, expanded, "DP boundary expanded");
        }

        let settled = dp[n]
            .iter()
            .flatten()
            .copied()
            .reduce(|best, cand| if cand.0.beats(&best.0) { cand } else { best });
        let best = match (settled, unsettled) {
            (Some(s), Some(u)) => Some(if u.0.beats(&s.0) { u } else { s }),
            (s, u) => s.or(u),
        };
        let Some((best, mut hold)) = best else {
            let slot = &problem.slots[frontier.min(n - 1)];
            return Err(InfeasibleScheduleError {
                slot_index: slot.index,
                slot_start: slot.start,
                constraint: ViolatedConstraint::UnreachableComfortBand {
                    low_f: slot.band.low_f,
                    high_f: slot.band.high_f,
                },
            }
            .into());
        };

        let mut setpoints = vec![target; n];
        let mut end = n;
        loop {
            let value = problem.grid.value(hold.setpoint);
            setpoints[hold.from_slot..end].fill(value);
            if hold.from_slot == 0 {
                break;
            }
            end = hold.from_slot;
            hold = dp[hold.from_slot][hold.from_state]
                .map(|(_, h)| h)
                .ok_or(PlanningError::Timeout {
                    budget_ms: deadline.budget_ms(),
                    slots_completed: end,
                    slots_total: n,
                })?;
        }

        let steps = problem.simulate(&setpoints);
        debug!(
            cost = best.cost,
            discomfort = best.discomfort,
            final_temperature_f = steps.last().map(|s| s.end_f).unwrap_or(target),
            "DP optimum found"
        );
        Ok(problem.schedule(self.name(), &setpoints, &steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::{
        ConditioningMode, CustomComfortSchedule, DayType, OptimizationRequest, PriceTier, RatePlan, SavingsLevel,
        TariffPeriod, TimeOfDay,
    };
    use crate::optimizer::ComfortOnlyBaseline;
    use crate::thermal::ThermalModel;
    use chrono::NaiveDate;

    fn t(h: u32, m: u32) -> TimeOfDay {
        TimeOfDay::hm(h, m).unwrap()
    }

    fn peak_plan() -> RatePlan {
        let p = |start, end, tier, price| TariffPeriod {
            day_type: DayType::All,
            start,
            end,
            tier,
            price_per_kwh: price,
        };
        RatePlan::year_round(
            "peak",
            "Peak",
            vec![
                p(TimeOfDay::MIDNIGHT, t(16, 0), PriceTier::OffPeak, 0.12),
                p(t(16, 0), t(21, 0), PriceTier::OnPeak, 0.45),
                p(t(21, 0), TimeOfDay::END_OF_DAY, PriceTier::OffPeak, 0.12),
            ],
        )
    }

    fn scenario() -> OptimizationRequest {
        OptimizationRequest::new(
            ThermalModel::new(1.5, 1.0, 0.8, 1.0),
            peak_plan(),
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
        )
        .with_savings_level(SavingsLevel::High)
        .with_assumed_outdoor(95.0)
    }

    fn solve(req: &OptimizationRequest) -> Result<Schedule, PlanningError> {
        let problem = PlanningProblem::build(req, &Config::default())?;
        DynamicProgrammingOptimizer.optimize(&problem, &Deadline::unbounded())
    }

    #[test]
    fn test_precools_before_peak() {
        let schedule = solve(&scenario()).unwrap();
        assert!(schedule.validate_partition().is_ok());

        let before_peak = schedule.slot_at(t(15, 30)).unwrap();
        assert!((68.0..=70.0).contains(&before_peak.setpoint_f), "pre-cooled to {}", before_peak.setpoint_f);
        assert!(before_peak.expected_temperature_f <= 70.5);

        let peak: Vec<(f64, f64)> = schedule
            .slots
            .iter()
            .filter(|s| s.expected_price_tier == PriceTier::OnPeak)
            .map(|s| (s.setpoint_f, s.expected_temperature_f))
            .collect();
        assert!(peak.windows(2).all(|w| w[1].0 >= w[0].0), "{peak:?}");
        // coasting up through the peak, never cooling back down
        assert!(peak.windows(2).all(|w| w[1].1 >= w[0].1 - 1e-9), "{peak:?}");

        for slot in schedule.slots.iter().filter(|s| s.occupied) {
            let band = slot.comfort_low_f - 1e-9..=slot.comfort_high_f + 1e-9;
            assert!(band.contains(&slot.setpoint_f), "{} at {}", slot.setpoint_f, slot.start_time);
            assert!(band.contains(&slot.expected_temperature_f), "{} at {}", slot.expected_temperature_f, slot.start_time);
        }
    }

    #[test]
    fn test_schedule_costs_match_simulation() {
        let problem = PlanningProblem::build(&scenario(), &Config::default()).unwrap();
        let schedule = DynamicProgrammingOptimizer.optimize(&problem, &Deadline::unbounded()).unwrap();
        let setpoints: Vec<f64> = schedule.slots.iter().map(|s| s.setpoint_f).collect();
        let steps = problem.simulate(&setpoints);
        for (slot, step) in schedule.slots.iter().zip(&steps) {
            assert_eq!(slot.expected_temperature_f, step.end_f);
            assert_eq!(slot.energy_kwh, step.transition.energy_kwh);
        }
    }

    #[test]
    fn test_mild_day_lets_the_home_drift() {
        // drift is slower than half a grid step per slot at 80 °F outside
        let req = scenario().with_assumed_outdoor(80.0);
        let problem = PlanningProblem::build(&req, &Config::default()).unwrap();
        let optimized = DynamicProgrammingOptimizer.optimize(&problem, &Deadline::unbounded()).unwrap();
        let baseline = ComfortOnlyBaseline.optimize(&problem, &Deadline::unbounded()).unwrap();
        assert!(optimized.projected_energy_kwh < baseline.projected_energy_kwh);
        assert!(optimized.projected_cost < baseline.projected_cost);
        assert!(optimized.slots.iter().any(|s| s.setpoint_f > 72.0));
    }

    #[test]
    fn test_weak_equipment_plans_within_capacity() {
        // pull-down of ~0.3 °F per half hour cannot pre-cool in one slot
        let mut req = scenario();
        req.thermal_model = ThermalModel::new(0.69, 1.0, 0.8, 1.0);
        let problem = PlanningProblem::build(&req, &Config::default()).unwrap();
        let schedule = DynamicProgrammingOptimizer.optimize(&problem, &Deadline::unbounded()).unwrap();
        let mut temp = problem.initial_temperature();
        for (slot, planned) in problem.slots.iter().zip(&schedule.slots) {
            // flat out all slot long
            let floor = problem.physics.replay(temp, 0.0, slot.outdoor_f, slot.hours).end_f;
            assert!(planned.expected_temperature_f >= floor - 1e-9, "{} below {floor}", planned.expected_temperature_f);
            temp = planned.expected_temperature_f;
        }
    }

    #[test]
    fn test_beats_comfort_baseline() {
        let req = scenario();
        let problem = PlanningProblem::build(&req, &Config::default()).unwrap();
        let optimized = DynamicProgrammingOptimizer.optimize(&problem, &Deadline::unbounded()).unwrap();
        let baseline = ComfortOnlyBaseline.optimize(&problem, &Deadline::unbounded()).unwrap();
        assert!(optimized.projected_cost < baseline.projected_cost);
    }

    #[test]
    fn test_flat_price_holds_near_target() {
        let mut req = scenario();
        req.rate_plan = RatePlan::year_round(
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
        let schedule = solve(&req).unwrap();
        // no reason to cool below the target when prices never change
        assert!(schedule.slots.iter().all(|s| s.setpoint_f >= 72.0));
        assert!(schedule.slots.iter().all(|s| s.expected_temperature_f >= 72.0 - 1e-9));
    }

    #[test]
    fn test_deterministic() {
        let a = solve(&scenario()).unwrap();
        let b = solve(&scenario()).unwrap();
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn test_zero_budget_times_out() {
        let problem = PlanningProblem::build(&scenario(), &Config::default()).unwrap();
        let err = DynamicProgrammingOptimizer
            .optimize(&problem, &Deadline::after(std::time::Duration::ZERO))
            .unwrap_err();
        assert!(matches!(err, PlanningError::Timeout { slots_completed: 0, .. }));
    }

    #[test]
    fn test_empty_band_reported_with_slot() {
        let mut low = vec![70.0; 48];
        let high = vec![74.0; 48];
        low[10] = 86.0;
        let req = scenario().with_custom_comfort(CustomComfortSchedule {
            interval_minutes: 30,
            low_f: low,
            high_f: high.iter().enumerate().map(|(i, h)| if i == 10 { 90.0 } else { *h }).collect(),
        });
        let err = solve(&req).unwrap_err();
        // band for 05:00 applies to the end of the 04:30 slot
        match err {
            PlanningError::Infeasible(e) => {
                assert_eq!(e.slot_index, 9);
                assert!(matches!(e.constraint, ViolatedConstraint::EmptyComfortBand { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unreachable_band_reported() {
        // hot start, weak equipment, must be at 70 by 00:30
        let mut req = scenario().with_initial_temperature(84.0);
        req.thermal_model = ThermalModel::new(0.2, 0.2, 0.8, 1.0);
        let err = solve(&req).unwrap_err();
        match err {
            PlanningError::Infeasible(e) => {
                assert_eq!(e.slot_index, 0);
                assert_eq!(e.slot_start, TimeOfDay::MIDNIGHT);
                assert!(matches!(e.constraint, ViolatedConstraint::UnreachableComfortBand { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_heat_mode_preheats() {
        let req = scenario()
            .with_mode(ConditioningMode::Heat)
            .with_comfort_target(68.0)
            .with_assumed_outdoor(40.0);
        let schedule = solve(&req).unwrap();
        let before_peak = schedule.slot_at(t(15, 30)).unwrap().setpoint_f;
        let peak_end = schedule.slot_at(t(20, 30)).unwrap().setpoint_f;
        assert!(before_peak > peak_end, "{before_peak} vs {peak_end}");
    }
}
