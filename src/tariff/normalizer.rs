use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::catalog::{periods_for, validate_plan};
use crate::domain::{DayType, PriceTier, RatePlan, TimeOfDay, MINUTES_PER_DAY};
use crate::error::ConfigurationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePeriod {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub tier: PriceTier,
    pub price_per_kwh: f64,
}

/// Price timeline of one rate plan resolved for one calendar date.
///
/// Periods tile `[00:00, 24:00)` in order; this is checked on construction so
/// every lookup succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceFunction {
    pub plan_id: String,
    pub date: NaiveDate,
    pub day_type: DayType,
    pub season: String,
    periods: Vec<PricePeriod>,
}

impl PriceFunction {
    pub fn normalize(plan: &RatePlan, date: NaiveDate) -> Result<Self, ConfigurationError> {
        validate_plan(plan)?;
        let season = plan
            .season_for(date.month())
            .ok_or_else(|| ConfigurationError::MalformedRatePlan {
                plan_id: plan.plan_id.clone(),
                reason: format!("no season covers month {}", date.month()),
            })?;
        let day_type = DayType::of(date);
        let periods = periods_for(season, day_type)
            .into_iter()
            .map(|p| PricePeriod {
                start: p.start,
                end: p.end,
                tier: p.tier,
                price_per_kwh: p.price_per_kwh,
            })
            .collect();

        Ok(Self {
            plan_id: plan.plan_id.clone(),
            date,
            day_type,
            season: season.name.clone(),
            periods,
        })
    }

    pub fn periods(&self) -> &[PricePeriod] {
        &self.periods
    }

    /// Period in force at `t` (`24:00` wraps to midnight).
    pub fn at(&self, t: TimeOfDay) -> &PricePeriod {
        let t = t.normalized();
        let idx = self.periods.partition_point(|p| p.start <= t);
        &self.periods[idx.saturating_sub(1)]
    }

    pub fn tier_at(&self, t: TimeOfDay) -> PriceTier {
        self.at(t).tier
    }

    pub fn price_at(&self, t: TimeOfDay) -> f64 {
        self.at(t).price_per_kwh
    }

    /// Time-weighted mean price over `[start, end)`, wrapping past midnight
    /// when `end < start`. An empty interval yields the point price.
    pub fn average_price(&self, start: TimeOfDay, end: TimeOfDay) -> f64 {
        let (s, e) = (start.minutes(), end.minutes());
        if s == e {
            return self.price_at(start);
        }
        if s < e {
            return self.integral(s, e) / f64::from(e - s);
        }
        let total = self.integral(s, MINUTES_PER_DAY) + self.integral(0, e);
        total / f64::from(MINUTES_PER_DAY - s + e)
    }

    /// Price × minutes over `[s, e)` within a single day.
    fn integral(&self, s: u32, e: u32) -> f64 {
        self.periods
            .iter()
            .map(|p| {
                let lo = p.start.minutes().max(s);
                let hi = p.end.minutes().min(e);
                if hi > lo {
                    p.price_per_kwh * f64::from(hi - lo)
                } else {
                    0.0
                }
            })
            .sum()
    }

    /// Times of day (excluding midnight) where the price or tier changes.
    pub fn boundaries(&self) -> Vec<TimeOfDay> {
        self.periods
            .windows(2)
            .filter(|w| w[0].tier != w[1].tier || w[0].price_per_kwh != w[1].price_per_kwh)
            .map(|w| w[1].start)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TariffPeriod;
    use crate::tariff::RatePlanCatalog;

    fn t(h: u32, m: u32) -> TimeOfDay {
        TimeOfDay::hm(h, m).unwrap()
    }

    fn scenario_plan() -> RatePlan {
        let p = |start, end, tier, price| TariffPeriod {
            day_type: DayType::All,
            start,
            end,
            tier,
            price_per_kwh: price,
        };
        RatePlan::year_round(
            "scenario",
            "Scenario",
            vec![
                p(t(0, 0), t(16, 0), PriceTier::OffPeak, 0.12),
                p(t(16, 0), t(21, 0), PriceTier::OnPeak, 0.45),
                p(t(21, 0), TimeOfDay::END_OF_DAY, PriceTier::OffPeak, 0.12),
            ],
        )
    }

    fn july_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
    }

    #[test]
    fn test_point_lookups() {
        let f = PriceFunction::normalize(&scenario_plan(), july_first()).unwrap();
        assert_eq!(f.tier_at(t(15, 59)), PriceTier::OffPeak);
        assert_eq!(f.tier_at(t(16, 0)), PriceTier::OnPeak);
        assert_eq!(f.price_at(t(20, 59)), 0.45);
        assert_eq!(f.price_at(t(21, 0)), 0.12);
        assert_eq!(f.price_at(TimeOfDay::END_OF_DAY), 0.12);
    }

    #[test]
    fn test_average_price_integral() {
        let f = PriceFunction::normalize(&scenario_plan(), july_first()).unwrap();
        assert!((f.average_price(t(16, 0), t(21, 0)) - 0.45).abs() < 1e-12);
        // one hour off-peak, one hour on-peak
        assert!((f.average_price(t(15, 0), t(17, 0)) - (0.12 + 0.45) / 2.0).abs() < 1e-12);
        // wraps midnight
        assert!((f.average_price(t(23, 0), t(1, 0)) - 0.12).abs() < 1e-12);
        assert_eq!(f.average_price(t(17, 0), t(17, 0)), 0.45);
    }

    #[test]
    fn test_boundaries() {
        let f = PriceFunction::normalize(&scenario_plan(), july_first()).unwrap();
        assert_eq!(f.boundaries(), vec![t(16, 0), t(21, 0)]);
    }

    #[test]
    fn test_season_and_weekend_resolution() {
        let catalog = RatePlanCatalog::builtin().unwrap();
        let plan = catalog.get("sdge-tou-dr1").unwrap();

        let summer_weekday = PriceFunction::normalize(plan, july_first()).unwrap();
        let summer_weekend = PriceFunction::normalize(plan, NaiveDate::from_ymd_opt(2025, 7, 5).unwrap()).unwrap();
        let winter_weekday = PriceFunction::normalize(plan, NaiveDate::from_ymd_opt(2025, 1, 7).unwrap()).unwrap();

        assert_eq!(summer_weekday.season, "summer");
        assert_eq!(winter_weekday.season, "winter");
        assert_eq!(summer_weekday.tier_at(t(10, 0)), PriceTier::MidPeak);
        assert_eq!(summer_weekend.tier_at(t(10, 0)), PriceTier::OffPeak);
        assert!(summer_weekday.price_at(t(17, 0)) > winter_weekday.price_at(t(17, 0)));
    }

    #[test]
    fn test_every_builtin_plan_normalizes_every_month() {
        let catalog = RatePlanCatalog::builtin().unwrap();
        for plan in catalog.plans() {
            for month in 1..=12 {
                for day in [1, 6] {
                    let date = NaiveDate::from_ymd_opt(2025, month, day).unwrap();
                    let f = PriceFunction::normalize(plan, date).unwrap();
                    assert_eq!(f.periods().first().unwrap().start, TimeOfDay::MIDNIGHT);
                    assert_eq!(f.periods().last().unwrap().end, TimeOfDay::END_OF_DAY);
                }
            }
        }
    }

    #[test]
    fn test_malformed_plan_fails_at_load() {
        let mut plan = scenario_plan();
        plan.seasons[0].periods.pop();
        let err = PriceFunction::normalize(&plan, july_first()).unwrap_err();
        assert!(matches!(err, ConfigurationError::MalformedRatePlan { .. }));
    }
}
