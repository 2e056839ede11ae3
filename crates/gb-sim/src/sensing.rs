//! Turning the simulated environment into sensor readings.

use gb_core::{Environment, Real, SensorReport};
use rand::Rng;

fn percent(value: Real) -> u8 {
    value.clamp(0.0, 100.0) as u8
}

fn celsius(value: Real) -> i32 {
    value.clamp(i32::MIN as Real, i32::MAX as Real) as i32
}

/// Quantize an environment the way the hardware sensors do: integer
/// readings truncated toward zero, percentages pinned to 0-100.
///
/// With `noise > 0` each quantized field is first perturbed by a uniform
/// sample in `[-noise, noise)`. Illumination is reported as measured.
pub fn quantize<R: Rng>(env: &Environment, noise: Real, rng: &mut R) -> SensorReport {
    let mut jitter = |value: Real| {
        if noise > 0.0 {
            value + rng.gen_range(-noise..noise)
        } else {
            value
        }
    };
    SensorReport {
        moisture: percent(jitter(env.moisture)),
        temp_inner: celsius(jitter(env.temp_inner)),
        humd_inner: percent(jitter(env.humd_inner)),
        temp_outer: celsius(jitter(env.temp_outer)),
        humd_outer: percent(jitter(env.humd_outer)),
        illumination: Some(env.illumination),
    }
}
