//! Reconciler configuration and tuning.
//!
//! Both are supplied from outside (settings file) and stay fixed for the
//! lifetime of a run. Validation happens once, before the first tick.

use gb_core::{LEVEL_MAX, Level, Real};
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// Control targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Acceptable soil moisture band `[min, max]` (%).
    pub moisture_range: (i32, i32),
    /// Inner temperature setpoint (°C).
    pub target_inner_temp: i32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            moisture_range: (20, 60),
            target_inner_temp: 20,
        }
    }
}

impl ReconcilerConfig {
    pub fn validate(&self) -> ControlResult<()> {
        let (min, max) = self.moisture_range;
        if min > max {
            return Err(ControlError::InvalidConfig {
                what: "moisture_range min must not exceed max",
            });
        }
        Ok(())
    }
}

/// Tuning of a single control channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelTune {
    /// Proportional gain.
    pub kp: Real,
    /// Integral gain.
    pub ki: Real,
    /// Derivative gain.
    pub kd: Real,
    /// EMA smoothing factor, in (0, 1].
    pub ema_alpha: Real,
    /// Number of samples averaged before the EMA takes over.
    pub ema_count: usize,
    /// Errors smaller than this are treated as zero.
    pub deadband: Real,
}

impl ChannelTune {
    fn validate(&self, channel: &'static str) -> ControlResult<()> {
        let invalid = |what| Err(ControlError::InvalidTune { channel, what });
        for gain in [self.kp, self.ki, self.kd] {
            if !gain.is_finite() || gain < 0.0 {
                return invalid("gains must be finite and non-negative");
            }
        }
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return invalid("ema_alpha must be in (0, 1]");
        }
        if self.ema_count == 0 {
            return invalid("ema_count must be at least 1");
        }
        if !self.deadband.is_finite() || self.deadband < 0.0 {
            return invalid("deadband must be finite and non-negative");
        }
        Ok(())
    }
}

/// Full tuning set for the reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerTune {
    /// Moisture → pump channel.
    pub pump: ChannelTune,
    /// Inner temperature → Peltier channel.
    pub peltier: ChannelTune,
    /// Derivative low-pass time constant (seconds).
    pub der_tau: Real,
    /// Integral accumulator bound.
    pub aw_limit: Real,
    /// Peltier level at which the fan engages.
    pub cutoff: Level,
}

impl Default for ReconcilerTune {
    fn default() -> Self {
        Self {
            pump: ChannelTune {
                kp: 10.0,
                ki: 0.1,
                kd: 0.1,
                ema_alpha: 0.1,
                ema_count: 13,
                deadband: 1.0,
            },
            peltier: ChannelTune {
                kp: 30.0,
                ki: 0.2,
                kd: 0.001,
                ema_alpha: 0.1,
                ema_count: 13,
                deadband: 1.0,
            },
            der_tau: 1.0,
            aw_limit: 2.0,
            cutoff: 64,
        }
    }
}

impl ReconcilerTune {
    pub fn validate(&self) -> ControlResult<()> {
        self.pump.validate("pump")?;
        self.peltier.validate("peltier")?;
        if !self.der_tau.is_finite() || self.der_tau <= 0.0 {
            return Err(ControlError::InvalidTune {
                channel: "shared",
                what: "der_tau must be positive",
            });
        }
        if !self.aw_limit.is_finite() || self.aw_limit <= 0.0 {
            return Err(ControlError::InvalidTune {
                channel: "shared",
                what: "aw_limit must be positive",
            });
        }
        if self.cutoff > LEVEL_MAX {
            return Err(ControlError::InvalidTune {
                channel: "shared",
                what: "cutoff must be within the actuator range",
            });
        }
        Ok(())
    }
}
