//! Climate control engine for growbox.
//!
//! Turns noisy sensor samples into actuator commands. Two control channels run
//! side by side:
//! - **moisture → pump**: band channel, the pump only pushes water in
//! - **inner temperature → Peltier**: setpoint channel, effort sign picks polarity
//!
//! The fan is not controlled directly; it follows the Peltier level through a
//! fixed cutoff.
//!
//! # Architecture
//!
//! Each channel is a [`SignalConditioner`] (SMA warm-up, then EMA, plus a
//! low-passed derivative) feeding a [`PidChannel`] (deadband, clamped
//! integral). The [`Reconciler`] owns both channels and their state; every tick
//! is a transformation of that state, and command computation is a pure
//! function of it.

pub mod conditioner;
pub mod error;
pub mod pid;
pub mod reconciler;
pub mod tune;

pub use conditioner::{Conditioned, ConditionerPhase, ConditionerState, SignalConditioner};
pub use error::{ControlError, ControlResult};
pub use pid::{ChannelTarget, PidChannel, PidGains, PidState};
pub use reconciler::{
    ChannelState, IngestOutcome, Reconciler, ReconcilerState, ReconcilerView, SkipReason,
};
pub use tune::{ChannelTune, ReconcilerConfig, ReconcilerTune};
