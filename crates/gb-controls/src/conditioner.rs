//! Signal conditioning: raw sample in, smoothed value and rate of change out.
//!
//! A channel starts in warm-up, averaging the samples it has seen so far.
//! After `ema_count` samples it switches, once and for good, to exponential
//! smoothing seeded from that average. The derivative of the smoothed value is
//! itself low-passed so single noisy samples do not reach the controller.

use gb_core::Real;
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// Filter phase of one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ConditionerPhase {
    /// Averaging; holds every sample seen so far (never more than `ema_count`).
    Warmup { samples: Vec<Real> },
    /// Exponential smoothing; `samples` is the warm-up window that seeded it,
    /// frozen from here on.
    Steady { samples: Vec<Real> },
}

impl Default for ConditionerPhase {
    fn default() -> Self {
        ConditionerPhase::Warmup {
            samples: Vec::new(),
        }
    }
}

/// Conditioner state for one channel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionerState {
    pub phase: ConditionerPhase,
    /// Last filtered value, `None` until the first sample.
    pub filtered: Option<Real>,
    /// Low-passed derivative of the filtered value (units per second).
    pub derivative: Real,
}

impl ConditionerState {
    pub fn is_steady(&self) -> bool {
        matches!(self.phase, ConditionerPhase::Steady { .. })
    }

    /// Raw samples held by the warm-up window (at most `ema_count`).
    pub fn raw_samples(&self) -> &[Real] {
        match &self.phase {
            ConditionerPhase::Warmup { samples } | ConditionerPhase::Steady { samples } => samples,
        }
    }
}

/// Output of one conditioning step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conditioned {
    pub value: Real,
    pub derivative: Real,
}

/// SMA warm-up, EMA smoothing and a first-order derivative filter.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalConditioner {
    alpha: Real,
    ema_count: usize,
    der_tau: Real,
}

impl SignalConditioner {
    /// Create a conditioner.
    ///
    /// # Arguments
    ///
    /// * `alpha` - EMA smoothing factor, in (0, 1]
    /// * `ema_count` - Warm-up length in samples (at least 1)
    /// * `der_tau` - Derivative filter time constant in seconds (positive)
    pub fn new(alpha: Real, ema_count: usize, der_tau: Real) -> ControlResult<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(ControlError::InvalidArg {
                what: "alpha must be in (0, 1]",
            });
        }
        if ema_count == 0 {
            return Err(ControlError::InvalidArg {
                what: "ema_count must be at least 1",
            });
        }
        if !der_tau.is_finite() || der_tau <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "der_tau must be positive",
            });
        }
        Ok(Self {
            alpha,
            ema_count,
            der_tau,
        })
    }

    pub fn ema_count(&self) -> usize {
        self.ema_count
    }

    /// Feed one sample taken `dt` seconds after the previous one.
    ///
    /// `sample` must be finite and `dt` positive; the reconciler screens both
    /// before calling.
    pub fn update(
        &self,
        state: &ConditionerState,
        sample: Real,
        dt: Real,
    ) -> (ConditionerState, Conditioned) {
        debug_assert!(sample.is_finite() && dt > 0.0);

        let (phase, value) = match &state.phase {
            ConditionerPhase::Warmup { samples } => {
                let mut samples = samples.clone();
                samples.push(sample);
                let mean = samples.iter().sum::<Real>() / samples.len() as Real;
                if samples.len() >= self.ema_count {
                    (ConditionerPhase::Steady { samples }, mean)
                } else {
                    (ConditionerPhase::Warmup { samples }, mean)
                }
            }
            ConditionerPhase::Steady { samples } => {
                let prev = state.filtered.unwrap_or(sample);
                (
                    ConditionerPhase::Steady {
                        samples: samples.clone(),
                    },
                    self.alpha * sample + (1.0 - self.alpha) * prev,
                )
            }
        };

        let raw_derivative = match state.filtered {
            Some(prev) => (value - prev) / dt,
            None => 0.0,
        };
        let alpha_d = dt / (self.der_tau + dt);
        let derivative = state.derivative + alpha_d * (raw_derivative - state.derivative);

        let new_state = ConditionerState {
            phase,
            filtered: Some(value),
            derivative,
        };
        (new_state, Conditioned { value, derivative })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warmup_is_running_mean() {
        let cond = SignalConditioner::new(0.5, 4, 1.0).unwrap();
        let mut state = ConditionerState::default();
        let samples = [10.0, 20.0, 30.0];
        let mut sum = 0.0;
        for (i, s) in samples.iter().enumerate() {
            let (next, out) = cond.update(&state, *s, 1.0);
            sum += s;
            assert!((out.value - sum / (i + 1) as Real).abs() < 1e-12);
            assert!(!next.is_steady());
            state = next;
        }
        assert_eq!(state.raw_samples(), &[10.0, 20.0, 30.0]);
    }

    #[test]
    fn transition_at_ema_count_th_sample() {
        let cond = SignalConditioner::new(0.5, 3, 1.0).unwrap();
        let mut state = ConditionerState::default();
        for s in [3.0, 6.0] {
            state = cond.update(&state, s, 1.0).0;
            assert!(!state.is_steady());
        }
        let (state, out) = cond.update(&state, 9.0, 1.0);
        assert!(state.is_steady());
        assert!((out.value - 6.0).abs() < 1e-12);

        // Next sample is smoothed against the seed: 0.5 * 10 + 0.5 * 6
        let (state, out) = cond.update(&state, 10.0, 1.0);
        assert!((out.value - 8.0).abs() < 1e-12);
        // Warm-up window stays visible and no longer grows
        assert_eq!(state.raw_samples(), &[3.0, 6.0, 9.0]);
    }

    #[test]
    fn single_sample_warmup() {
        let cond = SignalConditioner::new(1.0, 1, 1.0).unwrap();
        let (state, out) = cond.update(&ConditionerState::default(), 42.0, 1.0);
        assert!(state.is_steady());
        assert_eq!(out.value, 42.0);
        assert_eq!(out.derivative, 0.0);
    }

    #[test]
    fn derivative_is_low_passed() {
        let cond = SignalConditioner::new(1.0, 1, 1.0).unwrap();
        let state = cond.update(&ConditionerState::default(), 0.0, 1.0).0;
        // Step of 10 in 1 s: raw derivative 10, alpha_d = 1 / (1 + 1) = 0.5
        let (state, out) = cond.update(&state, 10.0, 1.0);
        assert!((out.derivative - 5.0).abs() < 1e-12);
        // Flat afterwards: derivative decays toward zero
        let (_, out) = cond.update(&state, 10.0, 1.0);
        assert!((out.derivative - 2.5).abs() < 1e-12);
    }

    #[test]
    fn invalid_parameters() {
        assert!(SignalConditioner::new(0.0, 1, 1.0).is_err());
        assert!(SignalConditioner::new(0.5, 0, 1.0).is_err());
        assert!(SignalConditioner::new(0.5, 1, 0.0).is_err());
    }
}
