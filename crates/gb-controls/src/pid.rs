//! PID channel with deadband and a clamped integral.
//!
//! The channel is split in two halves so command computation stays pure:
//! - [`PidChannel::advance`] folds a new error into the state (deadband,
//!   integration, anti-windup clamp)
//! - [`PidChannel::effort`] turns the state plus the conditioned derivative
//!   into a signed control effort
//!
//! The derivative acts on the measurement, not on the error, so it tracks
//! signal motion and is never deadbanded. Its sign is flipped so a rising
//! measurement pulls the effort down, same as the derivative of the error
//! for a fixed target.

use gb_core::Real;
use serde::{Deserialize, Serialize};

use crate::conditioner::Conditioned;
use crate::error::{ControlError, ControlResult};

/// What the channel regulates toward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelTarget {
    /// Single target value.
    Setpoint(Real),
    /// Anything inside `[min, max]` is on target.
    Band { min: Real, max: Real },
}

impl ChannelTarget {
    /// Signed error: positive when the measurement sits below the target.
    pub fn error(&self, measured: Real) -> Real {
        match *self {
            ChannelTarget::Setpoint(target) => target - measured,
            ChannelTarget::Band { min, max } => {
                if measured < min {
                    min - measured
                } else if measured > max {
                    max - measured
                } else {
                    0.0
                }
            }
        }
    }
}

/// Proportional, integral and derivative gains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: Real,
    pub ki: Real,
    pub kd: Real,
}

/// PID channel state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PidState {
    /// Integral accumulator, always within `[-aw_limit, aw_limit]`.
    pub integral: Real,
    /// Error after deadbanding, as used by the proportional term.
    pub last_error: Real,
}

/// One PID channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PidChannel {
    gains: PidGains,
    deadband: Real,
    aw_limit: Real,
}

impl PidChannel {
    /// Create a channel.
    ///
    /// # Arguments
    ///
    /// * `gains` - Non-negative, finite gains
    /// * `deadband` - Error magnitude treated as zero (non-negative)
    /// * `aw_limit` - Integral clamp (positive)
    pub fn new(gains: PidGains, deadband: Real, aw_limit: Real) -> ControlResult<Self> {
        for gain in [gains.kp, gains.ki, gains.kd] {
            if !gain.is_finite() || gain < 0.0 {
                return Err(ControlError::InvalidArg {
                    what: "gains must be finite and non-negative",
                });
            }
        }
        if !deadband.is_finite() || deadband < 0.0 {
            return Err(ControlError::InvalidArg {
                what: "deadband must be non-negative",
            });
        }
        if !aw_limit.is_finite() || aw_limit <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "aw_limit must be positive",
            });
        }
        Ok(Self {
            gains,
            deadband,
            aw_limit,
        })
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    /// Apply the deadband to a raw error.
    pub fn deadbanded(&self, error: Real) -> Real {
        if error.abs() < self.deadband { 0.0 } else { error }
    }

    /// Fold a new raw error into the state.
    pub fn advance(&self, state: &PidState, error: Real, dt: Real) -> PidState {
        let error = self.deadbanded(error);
        let integral = (state.integral + error * dt).clamp(-self.aw_limit, self.aw_limit);
        PidState {
            integral,
            last_error: error,
        }
    }

    /// Signed control effort for the current state.
    pub fn effort(&self, state: &PidState, derivative: Real) -> Real {
        let p_term = self.gains.kp * state.last_error;
        let i_term = self.gains.ki * state.integral;
        let d_term = -self.gains.kd * derivative;
        p_term + i_term + d_term
    }

    /// Advance the state with a conditioned measurement and return the new
    /// effort alongside it.
    pub fn compute(
        &self,
        target: ChannelTarget,
        conditioned: Conditioned,
        state: &PidState,
        dt: Real,
    ) -> (Real, PidState) {
        let new_state = self.advance(state, target.error(conditioned.value), dt);
        let effort = self.effort(&new_state, conditioned.derivative);
        (effort, new_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(kp: Real, ki: Real, kd: Real, deadband: Real, aw_limit: Real) -> PidChannel {
        PidChannel::new(PidGains { kp, ki, kd }, deadband, aw_limit).unwrap()
    }

    fn steady(value: Real) -> Conditioned {
        Conditioned {
            value,
            derivative: 0.0,
        }
    }

    #[test]
    fn band_error() {
        let band = ChannelTarget::Band {
            min: 20.0,
            max: 60.0,
        };
        assert_eq!(band.error(15.0), 5.0);
        assert_eq!(band.error(40.0), 0.0);
        assert_eq!(band.error(20.0), 0.0);
        assert_eq!(band.error(65.0), -5.0);
    }

    #[test]
    fn setpoint_error() {
        assert_eq!(ChannelTarget::Setpoint(20.0).error(23.0), -3.0);
    }

    #[test]
    fn deadband_zeroes_small_errors() {
        let pid = channel(10.0, 1.0, 0.0, 1.0, 5.0);
        let (effort, state) = pid.compute(ChannelTarget::Setpoint(20.0), steady(19.5), &PidState::default(), 1.0);
        assert_eq!(effort, 0.0);
        assert_eq!(state.integral, 0.0);
        assert_eq!(state.last_error, 0.0);
    }

    #[test]
    fn derivative_ignores_deadband() {
        let pid = channel(1.0, 0.0, 2.0, 10.0, 5.0);
        let conditioned = Conditioned {
            value: 20.0,
            derivative: 1.5,
        };
        let (effort, _) = pid.compute(ChannelTarget::Setpoint(21.0), conditioned, &PidState::default(), 1.0);
        assert!((effort + 3.0).abs() < 1e-12);
    }

    #[test]
    fn integral_is_clamped_every_tick() {
        let pid = channel(0.0, 1.0, 0.0, 0.0, 2.0);
        let mut state = PidState::default();
        for _ in 0..10 {
            state = pid.advance(&state, 5.0, 1.0);
            assert!(state.integral <= 2.0);
        }
        assert_eq!(state.integral, 2.0);
        for _ in 0..10 {
            state = pid.advance(&state, -5.0, 1.0);
            assert!(state.integral >= -2.0);
        }
        assert_eq!(state.integral, -2.0);
    }

    #[test]
    fn invalid_parameters() {
        let gains = PidGains {
            kp: 1.0,
            ki: 1.0,
            kd: 1.0,
        };
        assert!(PidChannel::new(gains, -1.0, 1.0).is_err());
        assert!(PidChannel::new(gains, 0.0, 0.0).is_err());
        assert!(
            PidChannel::new(
                PidGains {
                    kp: -1.0,
                    ..gains
                },
                0.0,
                1.0
            )
            .is_err()
        );
    }
}
