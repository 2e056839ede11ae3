use crate::CoreError;

/// Floating point type used throughout system
pub type Real = f64;

/// Actuator level type (PWM duty, 10-bit).
pub type Level = u16;

/// Highest duty any actuator accepts.
pub const LEVEL_MAX: Level = 1023;

/// Level the fan runs at once engaged.
pub const FAN_ON_LEVEL: Level = LEVEL_MAX;

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Round a control effort magnitude onto the actuator range.
///
/// Non-finite efforts map to zero so they never reach an actuator.
pub fn level_from_effort(effort: Real) -> Level {
    if !effort.is_finite() {
        return 0;
    }
    effort.abs().round().clamp(0.0, LEVEL_MAX as Real) as Level
}

/// Fraction of full scale, in [0, 1].
pub fn level_fraction(level: Level) -> Real {
    level.min(LEVEL_MAX) as Real / LEVEL_MAX as Real
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn effort_is_clamped_and_rounded() {
        assert_eq!(level_from_effort(0.4), 0);
        assert_eq!(level_from_effort(63.5), 64);
        assert_eq!(level_from_effort(-200.2), 200);
        assert_eq!(level_from_effort(5000.0), LEVEL_MAX);
        assert_eq!(level_from_effort(Real::INFINITY), 0);
    }

    #[test]
    fn fraction_saturates() {
        assert_eq!(level_fraction(0), 0.0);
        assert_eq!(level_fraction(LEVEL_MAX), 1.0);
        assert_eq!(level_fraction(u16::MAX), 1.0);
    }
}
