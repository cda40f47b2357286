use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime, Timelike, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use super::{OptimizationService, Trigger};
use crate::error::{ConfigurationError, ServiceError};

/// Task status tracking
#[derive(Debug, Clone, Default)]
pub struct TaskStatus {
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub run_count: u64,
    pub success_count: u64,
    pub error_count: u64,
}

/// Re-plans every registered home once a day, shortly after midnight.
pub struct NightlyScheduler {
    service: Arc<OptimizationService>,
    at: NaiveTime,
    status: Arc<RwLock<TaskStatus>>,
}

impl NightlyScheduler {
    pub fn new(service: Arc<OptimizationService>) -> Result<Self, ConfigurationError> {
        let at = service.config().service.nightly_time()?;
        Ok(Self {
            service,
            at,
            status: Arc::new(RwLock::new(TaskStatus::default())),
        })
    }

    pub fn start(self: Arc<Self>) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.run_nightly_task().await;
        });
        info!(hour = self.at.hour(), minute = self.at.minute(), "Nightly optimization task started");
    }

    async fn run_nightly_task(&self) {
        loop {
            let now = Local::now().naive_local();
            let wait = until_next_run(now, self.at);
            info!(in_minutes = wait.as_secs() / 60, "Next nightly optimization scheduled");
            sleep(wait).await;

            self.run_once(Local::now().naive_local()).await;
        }
    }

    /// Plans `now`'s date for every home. A failing home never stops the others.
    pub async fn run_once(&self, now: NaiveDateTime) -> TaskStatus {
        let started = Utc::now();
        {
            let mut status = self.status.write().await;
            status.last_run = Some(started);
            status.run_count += 1;
        }

        let mut failures = Vec::new();
        for home_id in self.service.home_ids() {
            match self.service.request_run(&home_id, Trigger::Nightly, now.date(), now).await {
                Ok(_) => {}
                Err(ServiceError::Busy(_)) => {
                    warn!(home_id = %home_id, "Nightly run skipped, a run is already in flight");
                }
                Err(e) => {
                    error!(home_id = %home_id, error = %e, "Nightly optimization failed");
                    failures.push(format!("{home_id}: {e}"));
                }
            }
        }

        let mut status = self.status.write().await;
        if failures.is_empty() {
            status.last_success = Some(started);
            status.success_count += 1;
            status.last_error = None;
        } else {
            status.error_count += 1;
            status.last_error = Some(failures.join("; "));
        }
        status.clone()
    }

    pub async fn status(&self) -> TaskStatus {
        self.status.read().await.clone()
    }
}

/// Time from `now` until the next `at`, today if still ahead, else tomorrow.
pub fn until_next_run(now: NaiveDateTime, at: NaiveTime) -> Duration {
    let mut next = now.date().and_time(at);
    if next <= now {
        next += ChronoDuration::days(1);
    }
    (next - now).to_std().unwrap_or(Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::controller::HomeSettings;
    use crate::forecast::StaticForecast;
    use chrono::NaiveDate;
    use rstest::rstest;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, 1).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    #[rstest]
    #[case(at(0, 0), 5)]
    #[case(at(0, 5), 24 * 60)]
    #[case(at(23, 0), 65)]
    #[case(at(12, 30), 11 * 60 + 35)]
    fn test_until_next_run(#[case] now: NaiveDateTime, #[case] minutes: u64) {
        let at = NaiveTime::from_hms_opt(0, 5, 0).unwrap();
        assert_eq!(until_next_run(now, at), Duration::from_secs(minutes * 60));
    }

    #[tokio::test]
    async fn test_run_once_plans_every_home() {
        let service = OptimizationService::new(Config::default(), Arc::new(StaticForecast::constant(92.0))).unwrap();
        service.register_home(HomeSettings::new("a", "sdge-tou-dr1")).unwrap();
        service.register_home(HomeSettings::new("b", "xcel-tx-tou")).unwrap();
        let service = Arc::new(service);

        let scheduler = NightlyScheduler::new(service.clone()).unwrap();
        let status = scheduler.run_once(at(0, 5)).await;
        assert_eq!(status.run_count, 1);
        assert_eq!(status.success_count, 1);
        assert!(status.last_error.is_none());

        for home in ["a", "b"] {
            let outcome = service.latest(home).unwrap();
            assert_eq!(outcome.trigger, Trigger::Nightly);
            assert_eq!(outcome.schedule.date, at(0, 5).date());
        }
    }
}
