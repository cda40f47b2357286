use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, Mul, Sub};

use crate::error::ConfigurationError;

pub const MINUTES_PER_DAY: u32 = 1440;

// ============================================================================
// Time Helper Types
// ============================================================================

/// Minute-resolution time of day on a 24-hour cycle.
///
/// `24:00` is representable so that the last slot of a day has a proper end.
/// Serialized as `"HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u32);

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay(0);
    pub const END_OF_DAY: TimeOfDay = TimeOfDay(MINUTES_PER_DAY);

    /// Create from minutes since midnight (0..=1440)
    pub fn from_minutes(minutes: u32) -> Result<Self, ConfigurationError> {
        if minutes > MINUTES_PER_DAY {
            return Err(ConfigurationError::InvalidTime(format!(
                "{minutes} minutes is past the end of the day"
            )));
        }
        Ok(Self(minutes))
    }

    pub fn hm(hour: u32, minute: u32) -> Result<Self, ConfigurationError> {
        if minute >= 60 {
            return Err(ConfigurationError::InvalidTime(format!("{hour}:{minute}")));
        }
        Self::from_minutes(hour * 60 + minute)
    }

    pub fn minutes(&self) -> u32 {
        self.0
    }

    pub fn hours_f64(&self) -> f64 {
        self.0 as f64 / 60.0
    }

    pub fn hour(&self) -> u32 {
        self.0 / 60
    }

    pub fn minute(&self) -> u32 {
        self.0 % 60
    }

    /// Wrap `24:00` back onto midnight.
    pub fn normalized(&self) -> Self {
        Self(self.0 % MINUTES_PER_DAY)
    }

    /// Whether `self` falls in `[start, end)` on the 24h cycle.
    ///
    /// A window whose end precedes its start wraps past midnight. An empty
    /// window (`start == end`) contains nothing.
    pub fn within(&self, start: TimeOfDay, end: TimeOfDay) -> bool {
        let t = self.normalized().0;
        let (s, e) = (start.normalized().0, end.normalized().0);
        if s == e {
            false
        } else if s < e {
            t >= s && t < e
        } else {
            t >= s || t < e
        }
    }
}

impl From<NaiveTime> for TimeOfDay {
    fn from(t: NaiveTime) -> Self {
        Self(t.hour() * 60 + t.minute())
    }
}

impl std::str::FromStr for TimeOfDay {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "24:00" {
            return Ok(Self::END_OF_DAY);
        }
        NaiveTime::parse_from_str(s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .map(Self::from)
            .map_err(|_| ConfigurationError::InvalidTime(s.to_string()))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Physical Unit Newtypes
// ============================================================================

/// Energy in kilowatt-hours (kWh)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct Energy(pub f64);

impl Energy {
    pub const ZERO: Energy = Energy(0.0);

    pub fn kilowatt_hours(kwh: f64) -> Self {
        Self(kwh)
    }

    pub fn as_kilowatt_hours(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Energy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} kWh", self.0)
    }
}

impl Add for Energy {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Energy {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl std::iter::Sum for Energy {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Energy::ZERO, |a, b| a + b)
    }
}

/// Price in currency units per kilowatt-hour
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct Price(pub f64);

impl Price {
    pub fn per_kwh(price: f64) -> Self {
        Self(price)
    }

    pub fn as_per_kwh(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}/kWh", self.0)
    }
}

impl Mul<Energy> for Price {
    type Output = f64; // Cost in currency units
    fn mul(self, energy: Energy) -> Self::Output {
        self.0 * energy.as_kilowatt_hours()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("08:00", 480)]
    #[case("17:30", 1050)]
    #[case("00:00", 0)]
    #[case("24:00", 1440)]
    #[case("06:15:00", 375)]
    fn test_time_of_day_parsing(#[case] raw: &str, #[case] minutes: u32) {
        let t: TimeOfDay = raw.parse().unwrap();
        assert_eq!(t.minutes(), minutes);
    }

    #[test]
    fn test_time_of_day_rejects_garbage() {
        assert!("25:00".parse::<TimeOfDay>().is_err());
        assert!("noon".parse::<TimeOfDay>().is_err());
        assert!(TimeOfDay::from_minutes(1441).is_err());
    }

    #[test]
    fn test_time_of_day_display_roundtrip() {
        let t = TimeOfDay::hm(7, 5).unwrap();
        assert_eq!(t.to_string(), "07:05");
        let json = serde_json::to_string(&TimeOfDay::END_OF_DAY).unwrap();
        assert_eq!(json, "\"24:00\"");
    }

    #[test]
    fn test_within_wraps_midnight() {
        let t = |h| TimeOfDay::hm(h, 0).unwrap();
        assert!(t(9).within(t(8), t(17)));
        assert!(!t(17).within(t(8), t(17)));
        assert!(t(23).within(t(22), t(6)));
        assert!(t(2).within(t(22), t(6)));
        assert!(!t(12).within(t(22), t(6)));
        assert!(!t(12).within(t(8), t(8)));
    }

    #[test]
    fn test_price_energy_multiplication() {
        let price = Price::per_kwh(0.45);
        let energy = Energy::kilowatt_hours(2.0);
        assert!((price * energy - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_energy_sum() {
        let total: Energy = [1.0, 2.5, 0.5].into_iter().map(Energy::kilowatt_hours).sum();
        assert_eq!(total, Energy::kilowatt_hours(4.0));
    }
}
