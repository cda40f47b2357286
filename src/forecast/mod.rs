use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Source of hourly outdoor temperatures for a home's planning day.
///
/// `Ok(None)` means no forecast is available; planning then falls back to a
/// static outdoor assumption.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    async fn hourly_outdoor(&self, home_id: &str, date: NaiveDate) -> Result<Option<Vec<f64>>>;
}

/// Same hourly profile for every home and day.
#[derive(Debug, Clone)]
pub struct StaticForecast {
    hourly_f: Vec<f64>,
}

impl StaticForecast {
    pub fn new(hourly_f: Vec<f64>) -> Self {
        Self { hourly_f }
    }

    pub fn constant(outdoor_f: f64) -> Self {
        Self::new(vec![outdoor_f; 24])
    }
}

#[async_trait]
impl ForecastProvider for StaticForecast {
    async fn hourly_outdoor(&self, _home_id: &str, _date: NaiveDate) -> Result<Option<Vec<f64>>> {
        Ok(Some(self.hourly_f.clone()))
    }
}

/// No weather feed configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoForecast;

#[async_trait]
impl ForecastProvider for NoForecast {
    async fn hourly_outdoor(&self, _home_id: &str, _date: NaiveDate) -> Result<Option<Vec<f64>>> {
        Ok(None)
    }
}
