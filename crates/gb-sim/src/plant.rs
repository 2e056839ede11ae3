//! Plant physics and the stateful simulator around it.
//!
//! Each step applies, in order:
//! - moisture: pump inflow minus evaporation, clamped to the soil bounds
//! - inner temperature: relaxation toward the Peltier target, then leakage
//!   toward the outer temperature (faster with the fan on)
//! - humidity: seeded random walk with mean reversion, inner humidity also
//!   dries as the enclosure warms
//! - illumination: diurnal curve from the simulation clock
//!
//! Actuator commands only touch moisture and inner temperature.

use std::f64::consts::TAU;

use gb_core::{ControlCommand, EnvVariable, Environment, Real, SensorReport, level_fraction};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::error::{SimError, SimResult};
use crate::params::PlantParams;
use crate::sensing::quantize;

const SECONDS_PER_DAY: Real = 86_400.0;

fn relax(value: Real, target: Real, rate: Real, dt: Real) -> Real {
    target + (value - target) * (-rate * dt).exp()
}

fn walk<R: Rng>(amplitude: Real, dt: Real, rng: &mut R) -> Real {
    if amplitude > 0.0 {
        rng.gen_range(-amplitude..amplitude) * dt
    } else {
        0.0
    }
}

/// Illumination at `clock_s` seconds into the run.
pub fn illumination_at(params: &PlantParams, clock_s: Real) -> Real {
    let time_of_day = (params.start_time_of_day_s + clock_s).rem_euclid(SECONDS_PER_DAY);
    let phase = time_of_day / SECONDS_PER_DAY - 0.25;
    params.illumination_peak * (TAU * phase).sin().max(0.0)
}

/// Advance `env` by `dt` seconds under `command`.
///
/// `clock_s` is the simulation time at the end of the step and only drives
/// the illumination curve. Given the same inputs and RNG state the result is
/// identical.
pub fn advance<R: Rng>(
    params: &PlantParams,
    env: &Environment,
    command: &ControlCommand,
    dt: Real,
    clock_s: Real,
    rng: &mut R,
) -> SimResult<Environment> {
    if !dt.is_finite() || dt <= 0.0 {
        return Err(SimError::InvalidArg {
            what: "dt must be positive and finite",
        });
    }

    let pump = level_fraction(command.pump_level);
    let moisture = (env.moisture + (params.inflow_rate * pump - params.evaporation_rate) * dt)
        .clamp(params.moisture_floor, params.moisture_ceiling);

    let power = level_fraction(command.peltier_level);
    let mut temp_inner = env.temp_inner;
    if power > 0.0 {
        let sign = if command.is_forward() { 1.0 } else { -1.0 };
        let target = env.temp_outer + sign * params.peltier_span * power;
        temp_inner = relax(temp_inner, target, params.heat_transfer_rate * power, dt);
    }
    let leak = if command.fan_level > 0 {
        params.leak_rate * params.fan_leak_gain
    } else {
        params.leak_rate
    };
    temp_inner = relax(temp_inner, env.temp_outer, leak, dt);

    let thermal_drying = params.humidity_temp_coupling * (temp_inner - params.humidity_reference_temp);
    let humd_inner = (env.humd_inner
        + (params.humidity_reversion * (env.humd_outer - env.humd_inner) - thermal_drying) * dt
        + walk(params.humidity_walk, dt, rng))
    .clamp(0.0, 100.0);
    let humd_outer = (env.humd_outer
        + params.humidity_reversion * (params.outer_humidity_mean - env.humd_outer) * dt
        + walk(params.humidity_walk, dt, rng))
    .clamp(0.0, 100.0);

    let next = Environment {
        moisture,
        temp_inner,
        humd_inner,
        temp_outer: env.temp_outer,
        humd_outer,
        illumination: illumination_at(params, clock_s),
    };
    if !next.is_finite() {
        return Err(SimError::NonPhysical {
            what: "environment left the finite range",
        });
    }
    Ok(next)
}

/// Owns one simulated environment and advances it tick by tick.
pub struct PlantSimulator {
    params: PlantParams,
    env: Environment,
    clock_s: Real,
    drift_rng: StdRng,
    sensor_rng: StdRng,
}

impl PlantSimulator {
    pub fn new(params: PlantParams) -> SimResult<Self> {
        Self::with_environment(params, Environment::default())
    }

    /// Start from a given environment.
    pub fn with_environment(params: PlantParams, env: Environment) -> SimResult<Self> {
        params.validate()?;
        if !env.is_finite() {
            return Err(SimError::InvalidArg {
                what: "initial environment must be finite",
            });
        }
        let mut env = env;
        env.illumination = illumination_at(&params, 0.0);
        let drift_rng = StdRng::seed_from_u64(params.seed);
        let sensor_rng = StdRng::seed_from_u64(params.seed.wrapping_add(1));
        Ok(Self {
            params,
            env,
            clock_s: 0.0,
            drift_rng,
            sensor_rng,
        })
    }

    pub fn params(&self) -> &PlantParams {
        &self.params
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Seconds simulated so far.
    pub fn clock_s(&self) -> Real {
        self.clock_s
    }

    /// Advance by `dt` seconds with the last command applied to the actuators.
    pub fn step(&mut self, dt: Real, command: &ControlCommand) -> SimResult<Environment> {
        let clock_s = self.clock_s + dt;
        let next = advance(&self.params, &self.env, command, dt, clock_s, &mut self.drift_rng)?;
        trace!(clock_s, moisture = next.moisture, temp_inner = next.temp_inner, "plant step");
        self.env = next;
        self.clock_s = clock_s;
        Ok(self.env.clone())
    }

    /// Overwrite one environment field.
    ///
    /// # Errors
    ///
    /// Unknown keys and non-finite values are rejected without touching the
    /// environment.
    pub fn set_variable(&mut self, key: &str, value: Real) -> SimResult<Environment> {
        let var: EnvVariable = key.parse()?;
        if !value.is_finite() {
            return Err(SimError::InvalidArg {
                what: "value must be finite",
            });
        }
        self.env.set(var, value);
        debug!(%var, value, "environment variable overridden");
        Ok(self.env.clone())
    }

    /// Read the sensors.
    pub fn sense(&mut self) -> SensorReport {
        quantize(&self.env, self.params.sensor_noise, &mut self.sensor_rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> PlantParams {
        PlantParams {
            humidity_walk: 0.0,
            ..PlantParams::default()
        }
    }

    #[test]
    fn pump_adds_moisture() {
        let mut sim = PlantSimulator::new(quiet()).unwrap();
        let before = sim.environment().moisture;
        let env = sim.step(1.0, &ControlCommand::new(1023, 0, true, 64)).unwrap();
        // +5 inflow, -0.5 evaporation
        assert!((env.moisture - (before + 4.5)).abs() < 1e-9);
    }

    #[test]
    fn forward_heats_reverse_cools() {
        let env = Environment {
            temp_inner: 15.0,
            temp_outer: 15.0,
            ..Environment::default()
        };
        let mut rng = StdRng::seed_from_u64(0);
        let heat = ControlCommand::new(0, 1023, true, 64);
        let cool = ControlCommand::new(0, 1023, false, 64);
        let warmer = advance(&quiet(), &env, &heat, 10.0, 10.0, &mut rng).unwrap();
        let cooler = advance(&quiet(), &env, &cool, 10.0, 10.0, &mut rng).unwrap();
        assert!(warmer.temp_inner > 15.0);
        assert!(cooler.temp_inner < 15.0);
    }

    #[test]
    fn fan_speeds_up_equalization() {
        let env = Environment {
            temp_inner: 30.0,
            temp_outer: 15.0,
            ..Environment::default()
        };
        let mut rng = StdRng::seed_from_u64(0);
        let still = ControlCommand::off();
        let fan = ControlCommand {
            fan_level: 1023,
            ..ControlCommand::off()
        };
        let slow = advance(&quiet(), &env, &still, 5.0, 5.0, &mut rng).unwrap();
        let fast = advance(&quiet(), &env, &fan, 5.0, 5.0, &mut rng).unwrap();
        assert!(fast.temp_inner < slow.temp_inner);
        assert!(slow.temp_inner < 30.0);
    }

    #[test]
    fn invalid_dt_rejected() {
        let mut sim = PlantSimulator::new(quiet()).unwrap();
        assert!(sim.step(0.0, &ControlCommand::off()).is_err());
        assert!(sim.step(Real::NAN, &ControlCommand::off()).is_err());
        assert_eq!(sim.clock_s(), 0.0);
    }

    #[test]
    fn illumination_is_dark_at_midnight_and_peaks_at_noon() {
        let params = PlantParams {
            start_time_of_day_s: 0.0,
            ..PlantParams::default()
        };
        assert_eq!(illumination_at(&params, 0.0), 0.0);
        assert!((illumination_at(&params, 12.0 * 3600.0) - params.illumination_peak).abs() < 1e-6);
    }
}
