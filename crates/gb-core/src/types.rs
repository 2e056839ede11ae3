//! Shared data model: what the sensors report, what the plant looks like, and
//! what the actuators are told to do.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::numeric::{FAN_ON_LEVEL, LEVEL_MAX, Level, Real};

/// One reading of every sensor in the enclosure.
///
/// Illumination is the only field that may be absent (light sensor missing or
/// unreadable); it is informational and never drives control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReport {
    /// Soil moisture (%).
    pub moisture: u8,
    /// Inner air temperature (°C).
    pub temp_inner: i32,
    /// Inner relative humidity (%).
    pub humd_inner: u8,
    /// Outer air temperature (°C).
    pub temp_outer: i32,
    /// Outer relative humidity (%).
    pub humd_outer: u8,
    /// Illumination (lux).
    #[serde(default)]
    pub illumination: Option<Real>,
}

/// Ground truth of the simulated plant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub moisture: Real,
    pub temp_inner: Real,
    pub humd_inner: Real,
    pub temp_outer: Real,
    pub humd_outer: Real,
    pub illumination: Real,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            moisture: 30.0,
            temp_inner: 18.0,
            humd_inner: 55.0,
            temp_outer: 15.0,
            humd_outer: 60.0,
            illumination: 0.0,
        }
    }
}

impl Environment {
    pub fn get(&self, var: EnvVariable) -> Real {
        match var {
            EnvVariable::Moisture => self.moisture,
            EnvVariable::TempInner => self.temp_inner,
            EnvVariable::HumdInner => self.humd_inner,
            EnvVariable::TempOuter => self.temp_outer,
            EnvVariable::HumdOuter => self.humd_outer,
            EnvVariable::Illumination => self.illumination,
        }
    }

    pub fn set(&mut self, var: EnvVariable, value: Real) {
        let slot = match var {
            EnvVariable::Moisture => &mut self.moisture,
            EnvVariable::TempInner => &mut self.temp_inner,
            EnvVariable::HumdInner => &mut self.humd_inner,
            EnvVariable::TempOuter => &mut self.temp_outer,
            EnvVariable::HumdOuter => &mut self.humd_outer,
            EnvVariable::Illumination => &mut self.illumination,
        };
        *slot = value;
    }

    pub fn is_finite(&self) -> bool {
        EnvVariable::ALL.iter().all(|v| self.get(*v).is_finite())
    }
}

/// The closed set of environment fields that can be overridden at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvVariable {
    Moisture,
    TempInner,
    HumdInner,
    TempOuter,
    HumdOuter,
    Illumination,
}

impl EnvVariable {
    pub const ALL: [EnvVariable; 6] = [
        EnvVariable::Moisture,
        EnvVariable::TempInner,
        EnvVariable::HumdInner,
        EnvVariable::TempOuter,
        EnvVariable::HumdOuter,
        EnvVariable::Illumination,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EnvVariable::Moisture => "moisture",
            EnvVariable::TempInner => "temp_inner",
            EnvVariable::HumdInner => "humd_inner",
            EnvVariable::TempOuter => "temp_outer",
            EnvVariable::HumdOuter => "humd_outer",
            EnvVariable::Illumination => "illumination",
        }
    }
}

impl fmt::Display for EnvVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvVariable {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EnvVariable::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| CoreError::UnknownVariable { key: s.to_string() })
    }
}

/// Actuator command produced by one reconciliation tick.
///
/// `fan_level` is derived from `peltier_level` and the cutoff; build commands
/// through [`ControlCommand::new`] so the two never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlCommand {
    /// Irrigation pump duty (0-1023).
    pub pump_level: Level,
    /// Peltier element duty (0-1023).
    pub peltier_level: Level,
    /// Peltier polarity: 1 for non-negative control effort, 0 otherwise.
    pub peltier_forward: u8,
    /// Fan duty (0 or 1023).
    pub fan_level: Level,
}

impl ControlCommand {
    pub fn new(pump_level: Level, peltier_level: Level, peltier_forward: bool, cutoff: Level) -> Self {
        let peltier_level = peltier_level.min(LEVEL_MAX);
        Self {
            pump_level: pump_level.min(LEVEL_MAX),
            peltier_level,
            peltier_forward: u8::from(peltier_forward),
            fan_level: fan_level_for(peltier_level, cutoff),
        }
    }

    /// Everything stopped.
    pub fn off() -> Self {
        Self {
            pump_level: 0,
            peltier_level: 0,
            peltier_forward: 0,
            fan_level: 0,
        }
    }

    pub fn is_forward(&self) -> bool {
        self.peltier_forward == 1
    }

    /// Check range and fan-derivation invariants against a cutoff.
    pub fn is_consistent(&self, cutoff: Level) -> bool {
        self.pump_level <= LEVEL_MAX
            && self.peltier_level <= LEVEL_MAX
            && self.peltier_forward <= 1
            && self.fan_level == fan_level_for(self.peltier_level, cutoff)
    }
}

/// Fan runs flat out whenever the Peltier is at or above the cutoff.
pub fn fan_level_for(peltier_level: Level, cutoff: Level) -> Level {
    if peltier_level >= cutoff { FAN_ON_LEVEL } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_cutoff_is_inclusive() {
        assert_eq!(ControlCommand::new(0, 63, true, 64).fan_level, 0);
        assert_eq!(ControlCommand::new(0, 64, true, 64).fan_level, 1023);
        assert_eq!(ControlCommand::new(0, 1023, false, 64).fan_level, 1023);
    }

    #[test]
    fn command_levels_are_clamped() {
        let cmd = ControlCommand::new(5000, 4000, false, 64);
        assert_eq!(cmd.pump_level, LEVEL_MAX);
        assert_eq!(cmd.peltier_level, LEVEL_MAX);
        assert_eq!(cmd.peltier_forward, 0);
        assert!(cmd.is_consistent(64));
    }

    #[test]
    fn env_variable_parses_known_keys_only() {
        for var in EnvVariable::ALL {
            assert_eq!(var.as_str().parse::<EnvVariable>().unwrap(), var);
        }
        let err = "co2".parse::<EnvVariable>().unwrap_err();
        assert_eq!(
            err,
            CoreError::UnknownVariable {
                key: "co2".to_string()
            }
        );
    }

    #[test]
    fn environment_set_then_get() {
        let mut env = Environment::default();
        env.set(EnvVariable::HumdOuter, 71.5);
        assert_eq!(env.get(EnvVariable::HumdOuter), 71.5);
        assert!(env.is_finite());
        env.set(EnvVariable::Illumination, f64::NAN);
        assert!(!env.is_finite());
    }

    #[test]
    fn report_without_illumination_deserializes() {
        let json = r#"{"moisture":40,"temp_inner":21,"humd_inner":50,"temp_outer":12,"humd_outer":70}"#;
        let report: SensorReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.moisture, 40);
        assert!(report.illumination.is_none());
    }
}
