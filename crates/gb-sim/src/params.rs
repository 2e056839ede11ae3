//! Plant parameters.

use gb_core::Real;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Physical constants of the simulated enclosure.
///
/// Rates are per second; levels enter as fractions of full scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantParams {
    /// Moisture gained per second at full pump (%/s).
    pub inflow_rate: Real,
    /// Moisture lost per second to evaporation (%/s).
    pub evaporation_rate: Real,
    /// Lowest moisture the soil can reach (%).
    pub moisture_floor: Real,
    /// Highest moisture the soil can hold (%).
    pub moisture_ceiling: Real,
    /// Offset from outer temperature the Peltier can hold at full power (°C).
    pub peltier_span: Real,
    /// Relaxation rate toward the Peltier target at full power (1/s).
    pub heat_transfer_rate: Real,
    /// Passive inner/outer equalization rate (1/s).
    pub leak_rate: Real,
    /// Multiplier on `leak_rate` while the fan runs.
    pub fan_leak_gain: Real,
    /// Reversion rate of inner humidity toward outer humidity (1/s).
    pub humidity_reversion: Real,
    /// Inner humidity drop per °C above `humidity_reference_temp`, per second.
    pub humidity_temp_coupling: Real,
    /// Temperature at which inner humidity has no thermal drift (°C).
    pub humidity_reference_temp: Real,
    /// Long-run mean of outer humidity (%).
    pub outer_humidity_mean: Real,
    /// Largest random humidity step per second (%).
    pub humidity_walk: Real,
    /// Peak illumination at solar noon (lux).
    pub illumination_peak: Real,
    /// Time of day at simulation start (seconds after midnight).
    pub start_time_of_day_s: Real,
    /// Uniform sensor noise amplitude applied when sensing (0 disables).
    pub sensor_noise: Real,
    /// RNG seed for humidity drift and sensor noise.
    pub seed: u64,
}

impl Default for PlantParams {
    fn default() -> Self {
        Self {
            inflow_rate: 5.0,
            evaporation_rate: 0.5,
            moisture_floor: 0.0,
            moisture_ceiling: 100.0,
            peltier_span: 15.0,
            heat_transfer_rate: 0.05,
            leak_rate: 0.01,
            fan_leak_gain: 3.0,
            humidity_reversion: 0.002,
            humidity_temp_coupling: 0.01,
            humidity_reference_temp: 20.0,
            outer_humidity_mean: 60.0,
            humidity_walk: 0.2,
            illumination_peak: 1000.0,
            start_time_of_day_s: 8.0 * 3600.0,
            sensor_noise: 0.0,
            seed: 0,
        }
    }
}

impl PlantParams {
    pub fn validate(&self) -> SimResult<()> {
        let non_negative = [
            (self.inflow_rate, "inflow_rate must be non-negative"),
            (self.evaporation_rate, "evaporation_rate must be non-negative"),
            (self.peltier_span, "peltier_span must be non-negative"),
            (self.heat_transfer_rate, "heat_transfer_rate must be non-negative"),
            (self.leak_rate, "leak_rate must be non-negative"),
            (self.humidity_reversion, "humidity_reversion must be non-negative"),
            (self.humidity_temp_coupling, "humidity_temp_coupling must be non-negative"),
            (self.humidity_walk, "humidity_walk must be non-negative"),
            (self.illumination_peak, "illumination_peak must be non-negative"),
            (self.sensor_noise, "sensor_noise must be non-negative"),
        ];
        for (value, what) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(SimError::InvalidArg { what });
            }
        }
        if !self.fan_leak_gain.is_finite() || self.fan_leak_gain < 1.0 {
            return Err(SimError::InvalidArg {
                what: "fan_leak_gain must be at least 1",
            });
        }
        if !(self.moisture_floor.is_finite()
            && self.moisture_ceiling.is_finite()
            && self.moisture_floor < self.moisture_ceiling)
        {
            return Err(SimError::InvalidArg {
                what: "moisture_floor must be below moisture_ceiling",
            });
        }
        if !self.humidity_reference_temp.is_finite()
            || !self.outer_humidity_mean.is_finite()
            || !self.start_time_of_day_s.is_finite()
        {
            return Err(SimError::InvalidArg {
                what: "plant parameters must be finite",
            });
        }
        Ok(())
    }
}
