use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ConditioningMode, PriceTier, TimeOfDay, MINUTES_PER_DAY};

/// One contiguous interval of the planned day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    /// Thermostat setpoint held through the slot
    pub setpoint_f: f64,
    /// Indoor temperature the model expects at the slot end
    pub expected_temperature_f: f64,
    pub expected_price_tier: PriceTier,
    pub price_per_kwh: f64,
    pub comfort_low_f: f64,
    pub comfort_high_f: f64,
    pub occupied: bool,
    pub energy_kwh: f64,
    pub cost: f64,
}

/// Full 24h setpoint plan. Superseded wholesale by the next run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub plan_id: String,
    pub date: NaiveDate,
    pub mode: ConditioningMode,
    pub comfort_target_f: f64,
    pub slot_minutes: u32,
    pub strategy: String,
    pub slots: Vec<ScheduleSlot>,
    pub projected_energy_kwh: f64,
    pub projected_cost: f64,
}

impl Schedule {
    pub fn setpoint_at(&self, t: TimeOfDay) -> Option<f64> {
        self.slot_at(t).map(|s| s.setpoint_f)
    }

    pub fn slot_at(&self, t: TimeOfDay) -> Option<&ScheduleSlot> {
        let t = t.normalized();
        self.slots.iter().find(|s| t >= s.start_time && t < s.end_time)
    }

    /// Per-slot (high, low) comfort limits, for charting alongside setpoints.
    pub fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        self.slots.iter().map(|s| (s.comfort_high_f, s.comfort_low_f)).unzip()
    }

    /// Checks that the slots tile 00:00-24:00 exactly.
    pub fn validate_partition(&self) -> Result<(), String> {
        let mut cursor = TimeOfDay::MIDNIGHT;
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.start_time != cursor {
                return Err(format!(
                    "slot {i} starts at {} but previous coverage ends at {cursor}",
                    slot.start_time
                ));
            }
            if slot.end_time <= slot.start_time {
                return Err(format!("slot {i} is empty or inverted"));
            }
            cursor = slot.end_time;
        }
        if cursor.minutes() != MINUTES_PER_DAY {
            return Err(format!("coverage ends at {cursor}, not 24:00"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(start: u32, end: u32, setpoint: f64) -> ScheduleSlot {
        ScheduleSlot {
            start_time: TimeOfDay::from_minutes(start).unwrap(),
            end_time: TimeOfDay::from_minutes(end).unwrap(),
            setpoint_f: setpoint,
            expected_temperature_f: setpoint,
            expected_price_tier: PriceTier::OffPeak,
            price_per_kwh: 0.1,
            comfort_low_f: 70.0,
            comfort_high_f: 74.0,
            occupied: true,
            energy_kwh: 0.0,
            cost: 0.0,
        }
    }

    fn schedule(slots: Vec<ScheduleSlot>) -> Schedule {
        Schedule {
            plan_id: "test".into(),
            date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            mode: ConditioningMode::Cool,
            comfort_target_f: 72.0,
            slot_minutes: 720,
            strategy: "test".into(),
            slots,
            projected_energy_kwh: 0.0,
            projected_cost: 0.0,
        }
    }

    #[test]
    fn test_partition_ok() {
        let s = schedule(vec![slot(0, 720, 72.0), slot(720, 1440, 73.0)]);
        assert!(s.validate_partition().is_ok());
        assert_eq!(s.setpoint_at(TimeOfDay::hm(13, 0).unwrap()), Some(73.0));
        assert_eq!(s.setpoint_at(TimeOfDay::END_OF_DAY), Some(72.0));
    }

    #[test]
    fn test_partition_gap_and_short_coverage() {
        assert!(schedule(vec![slot(0, 600, 72.0), slot(720, 1440, 72.0)])
            .validate_partition()
            .is_err());
        assert!(schedule(vec![slot(0, 720, 72.0)]).validate_partition().is_err());
    }

    #[test]
    fn test_bounds() {
        let s = schedule(vec![slot(0, 720, 72.0), slot(720, 1440, 73.0)]);
        let (high, low) = s.bounds();
        assert_eq!(high, vec![74.0, 74.0]);
        assert_eq!(low, vec![70.0, 70.0]);
    }
}
