//! The reconciler: two conditioned PID channels and the fan rule.

use gb_core::{ControlCommand, Real, SensorReport, level_from_effort};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conditioner::{ConditionerState, SignalConditioner};
use crate::error::ControlResult;
use crate::pid::{ChannelTarget, PidChannel, PidGains, PidState};
use crate::tune::{ChannelTune, ReconcilerConfig, ReconcilerTune};

/// State of one control channel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelState {
    pub conditioner: ConditionerState,
    pub pid: PidState,
}

/// Everything the reconciler remembers between ticks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReconcilerState {
    /// Moisture → pump.
    pub moisture: ChannelState,
    /// Inner temperature → Peltier.
    pub temperature: ChannelState,
    /// Ticks applied so far (skipped ticks excluded).
    pub ticks: u64,
}

/// State, config and tune together, as exposed to readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcilerView {
    pub state: ReconcilerState,
    pub config: ReconcilerConfig,
    pub tune: ReconcilerTune,
}

/// Why an ingest left the state untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    /// Elapsed time was zero, negative or not finite.
    InvalidDt(Real),
    /// A controlled sample was NaN or infinite.
    NonFiniteSample { what: &'static str },
}

/// Result of feeding one report to the reconciler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IngestOutcome {
    Applied,
    Skipped(SkipReason),
}

impl IngestOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, IngestOutcome::Applied)
    }
}

struct Channel {
    conditioner: SignalConditioner,
    pid: PidChannel,
}

impl Channel {
    fn new(tune: &ChannelTune, der_tau: Real, aw_limit: Real) -> ControlResult<Self> {
        Ok(Self {
            conditioner: SignalConditioner::new(tune.ema_alpha, tune.ema_count, der_tau)?,
            pid: PidChannel::new(
                PidGains {
                    kp: tune.kp,
                    ki: tune.ki,
                    kd: tune.kd,
                },
                tune.deadband,
                aw_limit,
            )?,
        })
    }

    fn step(
        &self,
        state: &ChannelState,
        target: ChannelTarget,
        sample: Real,
        dt: Real,
    ) -> ChannelState {
        let (conditioner, conditioned) = self.conditioner.update(&state.conditioner, sample, dt);
        let (_, pid) = self.pid.compute(target, conditioned, &state.pid, dt);
        ChannelState { conditioner, pid }
    }

    fn effort(&self, state: &ChannelState) -> Real {
        self.pid.effort(&state.pid, state.conditioner.derivative)
    }
}

/// Coordinates the moisture and temperature channels.
pub struct Reconciler {
    config: ReconcilerConfig,
    tune: ReconcilerTune,
    moisture: Channel,
    temperature: Channel,
    state: ReconcilerState,
}

impl Reconciler {
    /// Build a reconciler with fresh state.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if either `config` or `tune` is out of
    /// range; no tick can run with invalid parameters.
    pub fn new(config: ReconcilerConfig, tune: ReconcilerTune) -> ControlResult<Self> {
        config.validate()?;
        tune.validate()?;
        let moisture = Channel::new(&tune.pump, tune.der_tau, tune.aw_limit)?;
        let temperature = Channel::new(&tune.peltier, tune.der_tau, tune.aw_limit)?;
        Ok(Self {
            config,
            tune,
            moisture,
            temperature,
            state: ReconcilerState::default(),
        })
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn tune(&self) -> &ReconcilerTune {
        &self.tune
    }

    pub fn state(&self) -> &ReconcilerState {
        &self.state
    }

    pub fn describe_state(&self) -> ReconcilerView {
        ReconcilerView {
            state: self.state.clone(),
            config: self.config.clone(),
            tune: self.tune.clone(),
        }
    }

    /// Feed the controlled fields of a report, `dt` seconds after the last
    /// tick. Illumination and the outer readings are not used.
    pub fn ingest(&mut self, report: &SensorReport, dt: Real) -> IngestOutcome {
        self.ingest_samples(report.moisture as Real, report.temp_inner as Real, dt)
    }

    /// Feed raw moisture and inner temperature samples.
    ///
    /// Both channels advance together or not at all.
    pub fn ingest_samples(&mut self, moisture: Real, temp_inner: Real, dt: Real) -> IngestOutcome {
        if !dt.is_finite() || dt <= 0.0 {
            debug!(dt, "skipping tick: invalid dt");
            return IngestOutcome::Skipped(SkipReason::InvalidDt(dt));
        }
        for (what, sample) in [("moisture", moisture), ("temp_inner", temp_inner)] {
            if !sample.is_finite() {
                debug!(what, "skipping tick: non-finite sample");
                return IngestOutcome::Skipped(SkipReason::NonFiniteSample { what });
            }
        }

        let (min, max) = self.config.moisture_range;
        let band = ChannelTarget::Band {
            min: min as Real,
            max: max as Real,
        };
        let setpoint = ChannelTarget::Setpoint(self.config.target_inner_temp as Real);

        let moisture_state = self.moisture.step(&self.state.moisture, band, moisture, dt);
        let temperature_state = self
            .temperature
            .step(&self.state.temperature, setpoint, temp_inner, dt);

        self.state.moisture = moisture_state;
        self.state.temperature = temperature_state;
        self.state.ticks += 1;
        IngestOutcome::Applied
    }

    /// Actuator command for the current state.
    ///
    /// Depends only on state, config and tune, so repeated calls without an
    /// ingest in between return the same command. Before the first sample
    /// everything is off.
    pub fn compute_command(&self) -> ControlCommand {
        if self.state.ticks == 0 {
            return ControlCommand::off();
        }

        // The pump can only add water: negative effort means "do nothing".
        let pump_effort = self.moisture.effort(&self.state.moisture).max(0.0);
        let peltier_effort = self.temperature.effort(&self.state.temperature);

        ControlCommand::new(
            level_from_effort(pump_effort),
            level_from_effort(peltier_effort),
            peltier_effort >= 0.0,
            self.tune.cutoff,
        )
    }
}
