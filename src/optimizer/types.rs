use std::time::{Duration, Instant};

use tracing::info;

use super::{DynamicProgrammingOptimizer, PlanningProblem};
use crate::domain::Schedule;
use crate::error::PlanningError;

/// Caller-imposed wall-clock budget for one search.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Option<Duration>,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget: Some(budget),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            started: Instant::now(),
            budget: None,
        }
    }

    pub fn expired(&self) -> bool {
        self.budget.is_some_and(|b| self.started.elapsed() >= b)
    }

    pub fn budget_ms(&self) -> u64 {
        self.budget.map_or(u64::MAX, |b| b.as_millis() as u64)
    }

    /// Aborts with `Timeout` once the budget is spent.
    pub fn check(&self, slots_completed: usize, slots_total: usize) -> Result<(), PlanningError> {
        if self.expired() {
            return Err(PlanningError::Timeout {
                budget_ms: self.budget_ms(),
                slots_completed,
                slots_total,
            });
        }
        Ok(())
    }
}

/// A way of turning a planning problem into a full-day schedule.
///
/// Implementations are synchronous and CPU bound; async callers run them on a
/// blocking thread.
pub trait OptimizationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn optimize(&self, problem: &PlanningProblem, deadline: &Deadline) -> Result<Schedule, PlanningError>;
}

pub struct ScheduleOptimizer {
    pub strategy: Box<dyn OptimizationStrategy>,
}

impl Default for ScheduleOptimizer {
    fn default() -> Self {
        Self::new(Box::new(DynamicProgrammingOptimizer))
    }
}

impl ScheduleOptimizer {
    pub fn new(strategy: Box<dyn OptimizationStrategy>) -> Self {
        Self { strategy }
    }

    pub fn optimize(&self, problem: &PlanningProblem, deadline: &Deadline) -> Result<Schedule, PlanningError> {
        let started = Instant::now();
        let schedule = self.strategy.optimize(problem, deadline)?;
        info!(
            strategy = self.strategy.name(),
            plan_id = %schedule.plan_id,
            date = %schedule.date,
            slots = schedule.slots.len(),
            projected_cost = schedule.projected_cost,
            projected_energy_kwh = schedule.projected_energy_kwh,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Schedule optimized"
        );
        Ok(schedule)
    }
}
