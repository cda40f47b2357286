//! The supported time-of-use plans and their structural validation.
//!
//! SDG&E publishes three tiers (super off-peak, off-peak, on-peak); they map
//! onto `OffPeak`, `MidPeak` and `OnPeak` respectively.

use std::collections::BTreeSet;

use itertools::Itertools;

use crate::domain::{DayType, PriceTier, RatePlan, TariffPeriod, TariffSeason, TimeOfDay, MINUTES_PER_DAY};
use crate::error::ConfigurationError;

use DayType::{All, Weekday, Weekend};
use PriceTier::{MidPeak, OffPeak, OnPeak};

const SUMMER_JUN_OCT: &[u32] = &[6, 7, 8, 9, 10];
const WINTER_NOV_MAY: &[u32] = &[11, 12, 1, 2, 3, 4, 5];
const SUMMER_JUN_SEP: &[u32] = &[6, 7, 8, 9];
const WINTER_OCT_MAY: &[u32] = &[10, 11, 12, 1, 2, 3, 4, 5];
const ALL_YEAR: &[u32] = &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];

/// (day type, start hour, end hour, tier, price per kWh)
type Row = (DayType, u32, u32, PriceTier, f64);

/// Immutable set of known plans, validated on construction.
#[derive(Debug, Clone)]
pub struct RatePlanCatalog {
    plans: Vec<RatePlan>,
}

impl RatePlanCatalog {
    /// The eight built-in plans, numbered 1..=8 in catalog order.
    pub fn builtin() -> Result<Self, ConfigurationError> {
        Self::new(vec![
            sdge_tou_dr1()?,
            sdge_tou_dr2()?,
            sdge_tou_dr_p()?,
            sdge_tou_elec()?,
            sdge_standard_dr()?,
            nh_tou_whole_house()?,
            xcel_tx_tou()?,
            coned_residential_tou()?,
        ])
    }

    pub fn new(plans: Vec<RatePlan>) -> Result<Self, ConfigurationError> {
        for plan in &plans {
            validate_plan(plan)?;
        }
        if let Some(dup) = plans.iter().map(|p| p.plan_id.as_str()).duplicates().next() {
            return Err(ConfigurationError::MalformedRatePlan {
                plan_id: dup.to_string(),
                reason: "plan id defined twice".into(),
            });
        }
        Ok(Self { plans })
    }

    /// Looks a plan up by id, or by its 1-based position in the catalog.
    pub fn get(&self, id: &str) -> Result<&RatePlan, ConfigurationError> {
        let id = id.trim();
        if let Some(plan) = self.plans.iter().find(|p| p.plan_id.eq_ignore_ascii_case(id)) {
            return Ok(plan);
        }
        id.parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| self.plans.get(i))
            .ok_or_else(|| ConfigurationError::UnknownRatePlan(id.to_string()))
    }

    pub fn plans(&self) -> &[RatePlan] {
        &self.plans
    }
}

/// Checks that seasons cover each month exactly once and that, for every
/// season and day type, the periods tile 00:00-24:00 without gaps or overlaps.
pub fn validate_plan(plan: &RatePlan) -> Result<(), ConfigurationError> {
    let malformed = |reason: String| ConfigurationError::MalformedRatePlan {
        plan_id: plan.plan_id.clone(),
        reason,
    };

    if plan.seasons.is_empty() {
        return Err(malformed("no seasons defined".into()));
    }

    let mut covered = BTreeSet::new();
    for season in &plan.seasons {
        for &m in &season.months {
            if !(1..=12).contains(&m) {
                return Err(malformed(format!("season {} lists invalid month {m}", season.name)));
            }
            if !covered.insert(m) {
                return Err(malformed(format!("month {m} is covered by more than one season")));
            }
        }
    }
    if let Some(m) = (1..=12).find(|m| !covered.contains(m)) {
        return Err(malformed(format!("month {m} is not covered by any season")));
    }

    for season in &plan.seasons {
        if let Some(p) = season
            .periods
            .iter()
            .find(|p| !p.price_per_kwh.is_finite() || p.price_per_kwh < 0.0)
        {
            return Err(malformed(format!(
                "season {} has invalid price {} at {}",
                season.name, p.price_per_kwh, p.start
            )));
        }
        for day in [Weekday, Weekend] {
            check_partition(season, day).map_err(|reason| malformed(format!("season {}: {reason}", season.name)))?;
        }
    }
    Ok(())
}

fn check_partition(season: &TariffSeason, day: DayType) -> Result<(), String> {
    let periods = periods_for(season, day);
    let mut cursor = TimeOfDay::MIDNIGHT;
    for p in &periods {
        if p.end <= p.start {
            return Err(format!("{day} period {}-{} is empty or wraps midnight", p.start, p.end));
        }
        if p.start < cursor {
            return Err(format!("{day} periods overlap at {}", p.start));
        }
        if p.start > cursor {
            return Err(format!("{day} periods leave a gap {cursor}-{}", p.start));
        }
        cursor = p.end;
    }
    if cursor.minutes() != MINUTES_PER_DAY {
        return Err(format!("{day} periods end at {cursor}, not 24:00"));
    }
    Ok(())
}

/// Periods of `season` that apply on `day`, ordered by start.
pub(crate) fn periods_for(season: &TariffSeason, day: DayType) -> Vec<&TariffPeriod> {
    season
        .periods
        .iter()
        .filter(|p| p.day_type.applies_to(day))
        .sorted_by_key(|p| p.start)
        .collect()
}

fn season(name: &str, months: &[u32], rows: &[Row]) -> Result<TariffSeason, ConfigurationError> {
    let periods = rows
        .iter()
        .map(|&(day_type, start, end, tier, price)| {
            Ok::<_, ConfigurationError>(TariffPeriod {
                day_type,
                start: TimeOfDay::hm(start, 0)?,
                end: TimeOfDay::hm(end, 0)?,
                tier,
                price_per_kwh: price,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TariffSeason {
        name: name.to_string(),
        months: months.to_vec(),
        periods,
    })
}

fn plan(id: &str, name: &str, seasons: Vec<TariffSeason>) -> RatePlan {
    RatePlan {
        plan_id: id.to_string(),
        name: name.to_string(),
        seasons,
    }
}

/// SDG&E three-tier shape: super off-peak overnight (and weekend mornings),
/// on-peak 16-21 every day.
fn sdge_three_tier(months: &[u32], name: &str, off: f64, mid: f64, on: f64) -> Result<TariffSeason, ConfigurationError> {
    season(
        name,
        months,
        &[
            (Weekday, 0, 6, OffPeak, off),
            (Weekday, 6, 16, MidPeak, mid),
            (Weekday, 16, 21, OnPeak, on),
            (Weekday, 21, 24, MidPeak, mid),
            (Weekend, 0, 14, OffPeak, off),
            (Weekend, 14, 16, MidPeak, mid),
            (Weekend, 16, 21, OnPeak, on),
            (Weekend, 21, 24, MidPeak, mid),
        ],
    )
}

fn sdge_tou_dr1() -> Result<RatePlan, ConfigurationError> {
    Ok(plan(
        "sdge-tou-dr1",
        "San Diego Gas & Electric TOU-DR1",
        vec![
            sdge_three_tier(SUMMER_JUN_OCT, "summer", 0.32, 0.40, 0.62)?,
            sdge_three_tier(WINTER_NOV_MAY, "winter", 0.33, 0.39, 0.46)?,
        ],
    ))
}

fn sdge_tou_dr2() -> Result<RatePlan, ConfigurationError> {
    let two_tier = |months: &[u32], name: &str, off: f64, on: f64| {
        season(name, months, &[(All, 0, 16, OffPeak, off), (All, 16, 21, OnPeak, on), (All, 21, 24, OffPeak, off)])
    };
    Ok(plan(
        "sdge-tou-dr2",
        "San Diego Gas & Electric TOU-DR2",
        vec![
            two_tier(SUMMER_JUN_OCT, "summer", 0.41, 0.58)?,
            two_tier(WINTER_NOV_MAY, "winter", 0.42, 0.47)?,
        ],
    ))
}

fn sdge_tou_dr_p() -> Result<RatePlan, ConfigurationError> {
    Ok(plan(
        "sdge-tou-dr-p",
        "San Diego Gas & Electric TOU-DR-P",
        vec![
            sdge_three_tier(SUMMER_JUN_OCT, "summer", 0.30, 0.39, 0.71)?,
            sdge_three_tier(WINTER_NOV_MAY, "winter", 0.32, 0.38, 0.49)?,
        ],
    ))
}

fn sdge_tou_elec() -> Result<RatePlan, ConfigurationError> {
    Ok(plan(
        "sdge-tou-elec",
        "San Diego Gas & Electric TOU-ELEC",
        vec![
            sdge_three_tier(SUMMER_JUN_OCT, "summer", 0.26, 0.41, 0.59)?,
            sdge_three_tier(WINTER_NOV_MAY, "winter", 0.25, 0.40, 0.44)?,
        ],
    ))
}

fn sdge_standard_dr() -> Result<RatePlan, ConfigurationError> {
    Ok(plan(
        "sdge-standard-dr",
        "San Diego Gas & Electric Standard DR",
        vec![
            season("summer", SUMMER_JUN_OCT, &[(All, 0, 24, OffPeak, 0.41)])?,
            season("winter", WINTER_NOV_MAY, &[(All, 0, 24, OffPeak, 0.38)])?,
        ],
    ))
}

fn nh_tou_whole_house() -> Result<RatePlan, ConfigurationError> {
    Ok(plan(
        "nh-tou-whole-house",
        "New Hampshire TOU Whole House Domestic",
        vec![season(
            "year-round",
            ALL_YEAR,
            &[
                (Weekday, 0, 7, OffPeak, 0.17),
                (Weekday, 7, 16, MidPeak, 0.24),
                (Weekday, 16, 20, OnPeak, 0.36),
                (Weekday, 20, 23, MidPeak, 0.24),
                (Weekday, 23, 24, OffPeak, 0.17),
                (Weekend, 0, 24, OffPeak, 0.17),
            ],
        )?],
    ))
}

fn xcel_tx_tou() -> Result<RatePlan, ConfigurationError> {
    Ok(plan(
        "xcel-tx-tou",
        "Texas XCEL Time-Of-Use",
        vec![
            season(
                "summer",
                SUMMER_JUN_SEP,
                &[
                    (Weekday, 0, 13, OffPeak, 0.08),
                    (Weekday, 13, 19, OnPeak, 0.25),
                    (Weekday, 19, 24, OffPeak, 0.08),
                    (Weekend, 0, 24, OffPeak, 0.08),
                ],
            )?,
            season("non-summer", WINTER_OCT_MAY, &[(All, 0, 24, OffPeak, 0.09)])?,
        ],
    ))
}

fn coned_residential_tou() -> Result<RatePlan, ConfigurationError> {
    Ok(plan(
        "coned-residential-tou",
        "NYC ConEdison Residential TOU",
        vec![
            season(
                "summer",
                SUMMER_JUN_SEP,
                &[(Weekday, 0, 8, OffPeak, 0.09), (Weekday, 8, 24, OnPeak, 0.34), (Weekend, 0, 24, OffPeak, 0.09)],
            )?,
            season(
                "winter",
                WINTER_OCT_MAY,
                &[(Weekday, 0, 8, OffPeak, 0.09), (Weekday, 8, 24, OnPeak, 0.22), (Weekend, 0, 24, OffPeak, 0.09)],
            )?,
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = RatePlanCatalog::builtin().unwrap();
        assert_eq!(catalog.plans().len(), 8);
        assert_eq!(catalog.plans()[0].plan_id, "sdge-tou-dr1");
    }

    #[rstest]
    #[case("sdge-tou-dr1", "sdge-tou-dr1")]
    #[case("SDGE-TOU-DR2", "sdge-tou-dr2")]
    #[case("5", "sdge-standard-dr")]
    #[case("8", "coned-residential-tou")]
    fn test_lookup(#[case] query: &str, #[case] expected: &str) {
        let catalog = RatePlanCatalog::builtin().unwrap();
        assert_eq!(catalog.get(query).unwrap().plan_id, expected);
    }

    #[rstest]
    #[case("pge-e1")]
    #[case("0")]
    #[case("9")]
    fn test_unknown_plan(#[case] query: &str) {
        let catalog = RatePlanCatalog::builtin().unwrap();
        assert!(matches!(catalog.get(query), Err(ConfigurationError::UnknownRatePlan(_))));
    }

    fn flat(periods: &[Row]) -> RatePlan {
        plan("custom", "Custom", vec![season("all", ALL_YEAR, periods).unwrap()])
    }

    #[test]
    fn test_gap_rejected() {
        let p = flat(&[(All, 0, 12, OffPeak, 0.1), (All, 13, 24, OnPeak, 0.3)]);
        let err = validate_plan(&p).unwrap_err();
        assert!(err.to_string().contains("gap"), "{err}");
    }

    #[test]
    fn test_overlap_rejected() {
        let p = flat(&[(All, 0, 14, OffPeak, 0.1), (All, 12, 24, OnPeak, 0.3)]);
        assert!(validate_plan(&p).unwrap_err().to_string().contains("overlap"));
    }

    #[test]
    fn test_weekday_only_plan_rejected() {
        let p = flat(&[(Weekday, 0, 24, OffPeak, 0.1)]);
        assert!(validate_plan(&p).is_err());
    }

    #[test]
    fn test_uncovered_month_rejected() {
        let p = plan("gap", "Gap", vec![season("summer", SUMMER_JUN_OCT, &[(All, 0, 24, OffPeak, 0.1)]).unwrap()]);
        assert!(validate_plan(&p).unwrap_err().to_string().contains("month 1"));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let p = flat(&[(All, 0, 24, OffPeak, 0.1)]);
        assert!(RatePlanCatalog::new(vec![p.clone(), p]).is_err());
    }
}
