//! Emulated growbox enclosure.
//!
//! Provides:
//! - Plant parameters (rates, spans, drift and noise settings)
//! - Deterministic, seeded plant physics driven by actuator commands
//! - Sensing: quantizing the simulated environment into sensor reports

pub mod error;
pub mod params;
pub mod plant;
pub mod sensing;

pub use error::{SimError, SimResult};
pub use params::PlantParams;
pub use plant::{PlantSimulator, advance, illumination_at};
pub use sensing::quantize;
