//! Run coordination: per-home state, single-flight optimization runs and the
//! manual/nightly triggers feeding them.

pub mod scheduler;

pub use scheduler::{NightlyScheduler, TaskStatus};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{de, Deserialize, Deserializer, Serialize};
use strum_macros::Display;
use tokio::time::Instant;
use tracing::{info, trace, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{
    ConditioningMode, CustomComfortSchedule, OptimizationRequest, RatePlan, SavingsLevel, SavingsReport, Schedule,
    TelemetrySample, TimeOfDay,
};
use crate::error::{ConfigurationError, PlanningError, ServiceError};
use crate::forecast::ForecastProvider;
use crate::optimizer::{ComfortOnlyBaseline, Deadline, OptimizationStrategy, PlanningProblem, ScheduleOptimizer};
use crate::savings::SavingsCalculator;
use crate::tariff::RatePlanCatalog;
use crate::thermal::{TelemetryStore, ThermalEstimator, ThermalModel};

/// User-facing configuration of one home.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeSettings {
    pub home_id: String,
    pub rate_plan_id: String,
    pub comfort_target_f: f64,
    pub home_size_sqft: f64,
    pub away_time: TimeOfDay,
    pub home_time: TimeOfDay,
    /// `"low"`/`"medium"`/`"high"` or the form's numeric 1..=3
    #[serde(deserialize_with = "savings_level_setting")]
    pub savings_level: SavingsLevel,
    pub mode: ConditioningMode,
    #[serde(default)]
    pub custom_comfort: Option<CustomComfortSchedule>,
}

fn savings_level_setting<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SavingsLevel, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Numeric(u8),
        Named(SavingsLevel),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Numeric(n) => {
            SavingsLevel::from_level(n).ok_or_else(|| de::Error::custom(format!("savings level {n} is not in 1..=3")))
        }
        Raw::Named(level) => Ok(level),
    }
}

impl HomeSettings {
    /// Settings of a fresh installation on the given plan.
    pub fn new(home_id: impl Into<String>, rate_plan_id: impl Into<String>) -> Self {
        Self {
            home_id: home_id.into(),
            rate_plan_id: rate_plan_id.into(),
            comfort_target_f: 72.0,
            home_size_sqft: 2000.0,
            away_time: TimeOfDay::hm(8, 0).unwrap_or(TimeOfDay::MIDNIGHT),
            home_time: TimeOfDay::hm(17, 0).unwrap_or(TimeOfDay::MIDNIGHT),
            savings_level: SavingsLevel::Low,
            mode: ConditioningMode::Cool,
            custom_comfort: None,
        }
    }

    pub fn request(&self, model: ThermalModel, plan: RatePlan, date: NaiveDate) -> OptimizationRequest {
        let mut request = OptimizationRequest::new(model, plan, date)
            .with_comfort_target(self.comfort_target_f)
            .with_home_size(self.home_size_sqft)
            .with_occupancy(self.away_time, self.home_time)
            .with_savings_level(self.savings_level)
            .with_mode(self.mode);
        request.custom_comfort = self.custom_comfort.clone();
        request
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Trigger {
    Nightly,
    Manual,
}

/// Result of one completed run. The schedule itself carries no run metadata,
/// so identical inputs yield identical schedules.
#[derive(Debug, Clone, Serialize)]
pub struct PlanOutcome {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub home_id: String,
    pub trigger: Trigger,
    pub model: ThermalModel,
    pub model_fallback: bool,
    pub schedule: Schedule,
    pub baseline: Schedule,
    pub report: SavingsReport,
}

struct HomeState {
    settings: RwLock<HomeSettings>,
    telemetry: TelemetryStore,
    /// Held for the whole run; `try_lock_owned` failing means a run is in flight
    run_lock: Arc<tokio::sync::Mutex<()>>,
    last_manual: Mutex<Option<Instant>>,
    latest: RwLock<Option<Arc<PlanOutcome>>>,
}

pub struct OptimizationService {
    config: Arc<Config>,
    catalog: Arc<RatePlanCatalog>,
    forecast: Arc<dyn ForecastProvider>,
    homes: RwLock<HashMap<String, Arc<HomeState>>>,
}

impl OptimizationService {
    pub fn new(config: Config, forecast: Arc<dyn ForecastProvider>) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            catalog: Arc::new(RatePlanCatalog::builtin()?),
            forecast,
            homes: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Adds a home or replaces its settings, keeping telemetry and results.
    ///
    /// Settings are checked against the catalog and request limits here so
    /// that a bad configuration never reaches a run.
    pub fn register_home(&self, settings: HomeSettings) -> Result<(), ConfigurationError> {
        let plan = self.catalog.get(&settings.rate_plan_id)?.clone();
        let probe = settings.request(
            ThermalModel::default_for_home(settings.home_size_sqft),
            plan,
            Utc::now().date_naive(),
        );
        probe.check(self.config.optimizer.absolute_min_f, self.config.optimizer.absolute_max_f)?;

        let mut homes = self.homes.write();
        match homes.get(&settings.home_id) {
            Some(home) => *home.settings.write() = settings,
            None => {
                info!(home_id = %settings.home_id, rate_plan = %settings.rate_plan_id, "Home registered");
                homes.insert(
                    settings.home_id.clone(),
                    Arc::new(HomeState {
                        settings: RwLock::new(settings),
                        telemetry: TelemetryStore::new(self.config.service.telemetry_retention_days),
                        run_lock: Arc::new(tokio::sync::Mutex::new(())),
                        last_manual: Mutex::new(None),
                        latest: RwLock::new(None),
                    }),
                );
            }
        }
        Ok(())
    }

    pub fn home_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.homes.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn home(&self, home_id: &str) -> Result<Arc<HomeState>, ServiceError> {
        self.homes
            .read()
            .get(home_id)
            .cloned()
            .ok_or_else(|| ServiceError::UnknownHome(home_id.to_string()))
    }

    /// Appends a thermostat sample. Never waits on an in-flight run.
    pub fn record_telemetry(&self, home_id: &str, sample: TelemetrySample) -> Result<(), ServiceError> {
        let home = self.home(home_id)?;
        home.telemetry.append(sample)?;
        trace!(home_id, retained = home.telemetry.len(), "Telemetry sample recorded");
        Ok(())
    }

    pub fn latest(&self, home_id: &str) -> Option<Arc<PlanOutcome>> {
        self.homes.read().get(home_id).and_then(|h| h.latest.read().clone())
    }

    /// Runs estimation, optimization and savings evaluation for one home.
    ///
    /// At most one run per home is in flight: a concurrent request fails with
    /// `Busy` rather than queueing. Manual requests arriving within the
    /// debounce interval of the previous manual request are rejected.
    pub async fn request_run(
        &self,
        home_id: &str,
        trigger: Trigger,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<Arc<PlanOutcome>, ServiceError> {
        let home = self.home(home_id)?;

        let manual_at = if trigger == Trigger::Manual {
            let debounce = Duration::from_millis(self.config.service.manual_debounce_ms);
            let at = Instant::now();
            if let Some(prev) = *home.last_manual.lock() {
                let elapsed = at.duration_since(prev);
                if elapsed < debounce {
                    return Err(ServiceError::Debounced {
                        home_id: home_id.to_string(),
                        elapsed_ms: elapsed.as_millis() as u64,
                    });
                }
            }
            Some(at)
        } else {
            None
        };

        let _guard = home
            .run_lock
            .clone()
            .try_lock_owned()
            .map_err(|_| ServiceError::Busy(home_id.to_string()))?;
        // only an accepted manual request starts the debounce interval
        if let Some(at) = manual_at {
            *home.last_manual.lock() = Some(at);
        }

        let deadline = Deadline::after(Duration::from_millis(self.config.optimizer.timeout_ms));
        let settings = home.settings.read().clone();
        let telemetry = home.telemetry.window(now, self.config.estimator.window_days);
        let plan = self.catalog.get(&settings.rate_plan_id)?.clone();

        let forecast = match self.forecast.hourly_outdoor(home_id, date).await {
            Ok(f) => f,
            Err(e) => {
                warn!(home_id, error = %e, "Weather forecast unavailable, using static outdoor assumption");
                None
            }
        };

        if home.telemetry.is_empty() {
            info!(home_id, "No telemetry recorded yet, the default thermal model will be used");
        }
        info!(home_id, %trigger, %date, samples = telemetry.len(), "Optimization run started");
        let config = Arc::clone(&self.config);
        let planned = tokio::task::spawn_blocking(move || plan_day(&config, &settings, plan, date, &telemetry, forecast, &deadline))
            .await
            .map_err(|e| ServiceError::Join(e.to_string()))??;

        let (model, model_fallback, schedule, baseline, report) = planned;
        let outcome = Arc::new(PlanOutcome {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            home_id: home_id.to_string(),
            trigger,
            model,
            model_fallback,
            schedule,
            baseline,
            report,
        });
        *home.latest.write() = Some(Arc::clone(&outcome));

        info!(
            home_id,
            run_id = %outcome.run_id,
            savings_percent = outcome.report.savings_percent,
            projected_cost = outcome.schedule.projected_cost,
            "Optimization run finished"
        );
        Ok(outcome)
    }
}

type PlannedDay = (ThermalModel, bool, Schedule, Schedule, SavingsReport);

/// Synchronous body of a run, executed off the async runtime.
fn plan_day(
    config: &Config,
    settings: &HomeSettings,
    plan: RatePlan,
    date: NaiveDate,
    telemetry: &[TelemetrySample],
    forecast: Option<Vec<f64>>,
    deadline: &Deadline,
) -> Result<PlannedDay, PlanningError> {
    let fallback = ThermalModel::default_for_home(config.energy.default_model_sqft(settings.home_size_sqft));
    let model = ThermalEstimator::new(config.estimator.clone())
        .with_fallback(fallback)
        .estimate(telemetry);

    let mut request = settings.request(model.clone(), plan, date);
    request.weather_forecast = forecast.filter(|f| !f.is_empty());

    let problem = PlanningProblem::build(&request, config)?;
    let schedule = ScheduleOptimizer::default().optimize(&problem, deadline)?;
    let baseline = ComfortOnlyBaseline.optimize(&problem, deadline)?;
    let report = SavingsCalculator::new(config.savings.clone()).evaluate(
        &problem,
        &schedule,
        &baseline,
        config.savings.window_days,
    );
    Ok((model, problem.model_fallback, schedule, baseline, report))
}
