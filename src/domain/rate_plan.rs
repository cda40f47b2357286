use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use super::TimeOfDay;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DayType {
    Weekday,
    Weekend,
    All,
}

impl DayType {
    /// Weekday/weekend classification of a calendar date.
    pub fn of(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Sat | Weekday::Sun => DayType::Weekend,
            _ => DayType::Weekday,
        }
    }

    /// Whether periods tagged `self` apply on a day of type `day`.
    pub fn applies_to(&self, day: DayType) -> bool {
        *self == DayType::All || *self == day
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PriceTier {
    OffPeak,
    MidPeak,
    OnPeak,
}

/// One priced interval of a tariff. `end` is exclusive; `24:00` closes the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffPeriod {
    pub day_type: DayType,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub tier: PriceTier,
    pub price_per_kwh: f64,
}

/// Set of tariff periods applying in a subset of months.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffSeason {
    pub name: String,
    /// Calendar months (1-12) this season covers
    pub months: Vec<u32>,
    pub periods: Vec<TariffPeriod>,
}

/// Time-of-use tariff definition. Immutable reference data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatePlan {
    pub plan_id: String,
    pub name: String,
    pub seasons: Vec<TariffSeason>,
}

impl RatePlan {
    /// A single-season plan, valid all year.
    pub fn year_round(plan_id: impl Into<String>, name: impl Into<String>, periods: Vec<TariffPeriod>) -> Self {
        Self {
            plan_id: plan_id.into(),
            name: name.into(),
            seasons: vec![TariffSeason {
                name: "year-round".to_string(),
                months: (1..=12).collect(),
                periods,
            }],
        }
    }

    pub fn season_for(&self, month: u32) -> Option<&TariffSeason> {
        self.seasons.iter().find(|s| s.months.contains(&month))
    }
}
