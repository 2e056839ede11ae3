//! Report sources: where sensor readings come from.
//!
//! The runtime only talks to a [`ReportSource`]. Hardware adapters live
//! outside this workspace; the simulator-backed source is provided here.
//!
//! The simulated source publishes to the store while it still holds the
//! simulator, so a reading and an override can never reach the store in the
//! opposite order from the one they happened in.

use std::sync::{Arc, Mutex, PoisonError};

use gb_core::{ControlCommand, Environment, SensorReport};
use gb_sim::PlantSimulator;

use crate::error::{AppError, AppResult};
use crate::store::StateStore;

/// One reading from a source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceReading {
    pub report: SensorReport,
    /// Ground truth behind the report, if the source knows it.
    pub environment: Option<Environment>,
}

/// Read-side port: produces sensor reports, given the command currently
/// driving the actuators.
pub trait ReportSource: Send {
    /// Take a reading `dt` seconds after the previous one.
    fn read(&mut self, dt: f64, command: &ControlCommand) -> AppResult<SourceReading>;

    /// Override one environment variable. Only simulated sources support it.
    fn set_variable(&mut self, key: &str, _value: f64) -> AppResult<Environment> {
        Err(AppError::InvalidInput(format!(
            "source does not accept overrides (key '{key}')"
        )))
    }

    /// Take a reading driven by the store's latest command and publish it.
    fn ingest(&mut self, dt: f64, store: &StateStore) -> AppResult<()> {
        let command = store.latest_command().unwrap_or_else(ControlCommand::off);
        let reading = self.read(dt, &command)?;
        store.publish_report(reading.report, reading.environment)
    }
}

/// Source backed by a [`PlantSimulator`].
///
/// Clones share the same simulator, so one clone can run the ingestion loop
/// while another applies overrides.
#[derive(Clone)]
pub struct SimulatedSource {
    sim: Arc<Mutex<PlantSimulator>>,
}

impl SimulatedSource {
    pub fn new(sim: PlantSimulator) -> Self {
        Self {
            sim: Arc::new(Mutex::new(sim)),
        }
    }

    pub fn environment(&self) -> Environment {
        self.sim
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .environment()
            .clone()
    }

    /// Override one variable and publish the new environment before the
    /// simulator is released.
    pub fn set_variable_published(
        &self,
        key: &str,
        value: f64,
        store: &StateStore,
    ) -> AppResult<Environment> {
        let mut sim = self.sim.lock().unwrap_or_else(PoisonError::into_inner);
        let environment = sim.set_variable(key, value)?;
        store.publish_environment(environment.clone())?;
        Ok(environment)
    }
}

impl ReportSource for SimulatedSource {
    fn read(&mut self, dt: f64, command: &ControlCommand) -> AppResult<SourceReading> {
        let mut sim = self.sim.lock().unwrap_or_else(PoisonError::into_inner);
        let environment = sim.step(dt, command)?;
        let report = sim.sense();
        Ok(SourceReading {
            report,
            environment: Some(environment),
        })
    }

    fn set_variable(&mut self, key: &str, value: f64) -> AppResult<Environment> {
        let mut sim = self.sim.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(sim.set_variable(key, value)?)
    }

    fn ingest(&mut self, dt: f64, store: &StateStore) -> AppResult<()> {
        let command = store.latest_command().unwrap_or_else(ControlCommand::off);
        let mut sim = self.sim.lock().unwrap_or_else(PoisonError::into_inner);
        let environment = sim.step(dt, &command)?;
        let report = sim.sense();
        store.publish_report(report, Some(environment))
    }
}
