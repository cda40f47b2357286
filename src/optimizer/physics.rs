use crate::domain::ConditioningMode;
use crate::thermal::ThermalModel;

// Float slack on the capacity and direction limits; not a quantization allowance
const PHYSICS_EPS: f64 = 1e-9;

/// Energy drawn over one slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    /// Fraction of the slot the equipment runs, 0..=1
    pub duty: f64,
    pub energy_kwh: f64,
}

impl Transition {
    const IDLE: Transition = Transition {
        duty: 0.0,
        energy_kwh: 0.0,
    };
}

/// One slot of a thermostat holding a setpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotStep {
    pub end_f: f64,
    pub transition: Transition,
    /// Whether the home ended the slot exactly at the setpoint
    pub reached: bool,
}

/// How the home moves between two temperatures over one slot.
///
/// Rates are evaluated at the slot start temperature. A move is reachable
/// only if it needs no more than the equipment's capacity and no less than
/// idling; nothing is rounded onto a grid here.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotPhysics {
    pub model: ThermalModel,
    pub mode: ConditioningMode,
    pub hvac_power_kw: f64,
}

impl SlotPhysics {
    pub fn new(model: ThermalModel, mode: ConditioningMode, hvac_power_kw: f64) -> Self {
        Self {
            model,
            mode,
            hvac_power_kw,
        }
    }

    /// Idle end temperature.
    pub fn natural(&self, from_f: f64, outdoor_f: f64, hours: f64) -> f64 {
        from_f + self.model.drift_at(from_f, outdoor_f) * hours
    }

    /// Required work `q` (°F the equipment must remove or add versus drifting)
    /// and the most it can do in the slot.
    fn demand(&self, from_f: f64, to_f: f64, outdoor_f: f64, hours: f64) -> (f64, f64) {
        let drift = self.model.drift_at(from_f, outdoor_f);
        let natural = from_f + drift * hours;
        match self.mode {
            ConditioningMode::Cool => (
                natural - to_f,
                (drift.max(0.0) + self.model.cooling_rate_at(from_f, outdoor_f)) * hours,
            ),
            ConditioningMode::Heat => (
                to_f - natural,
                ((-drift).max(0.0) + self.model.heating_rate_at(from_f, outdoor_f)) * hours,
            ),
        }
    }

    /// Cost of ending the slot exactly at `to_f`, or `None` when the
    /// equipment cannot get there within the slot.
    pub fn transition(&self, from_f: f64, to_f: f64, outdoor_f: f64, hours: f64) -> Option<Transition> {
        let (q, capacity) = self.demand(from_f, to_f, outdoor_f, hours);
        if !q.is_finite() || q < -PHYSICS_EPS || q > capacity + PHYSICS_EPS {
            return None;
        }
        let duty = if capacity > 0.0 { (q / capacity).clamp(0.0, 1.0) } else { 0.0 };
        Some(Transition {
            duty,
            energy_kwh: duty * hours * self.hvac_power_kw,
        })
    }

    /// Runs a thermostat holding `setpoint_f` for one slot.
    ///
    /// Ends at the setpoint when physics allows, otherwise idles (setpoint on
    /// the far side of the drift) or runs flat out and ends short of it.
    pub fn replay(&self, from_f: f64, setpoint_f: f64, outdoor_f: f64, hours: f64) -> SlotStep {
        if let Some(transition) = self.transition(from_f, setpoint_f, outdoor_f, hours) {
            return SlotStep {
                end_f: setpoint_f,
                transition,
                reached: true,
            };
        }
        let natural = self.natural(from_f, outdoor_f, hours);
        let (q, capacity) = self.demand(from_f, setpoint_f, outdoor_f, hours);
        if q < 0.0 {
            return SlotStep {
                end_f: natural,
                transition: Transition::IDLE,
                reached: false,
            };
        }
        let end_f = match self.mode {
            ConditioningMode::Cool => natural - capacity,
            ConditioningMode::Heat => natural + capacity,
        };
        SlotStep {
            end_f,
            transition: Transition {
                duty: 1.0,
                energy_kwh: hours * self.hvac_power_kw,
            },
            reached: false,
        }
    }
}
