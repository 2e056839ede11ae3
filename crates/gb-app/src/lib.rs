//! Application layer for growbox.
//!
//! Wires the control engine, the plant simulator and the segment log
//! together behind one shared [`StateStore`]. Used by the CLI and by any
//! read-side consumer (dashboards, test harnesses).

pub mod control;
pub mod error;
pub mod runtime;
pub mod settings;
pub mod source;
pub mod store;

pub use control::{ControlLoop, TickOutcome};
pub use error::{AppError, AppResult};
pub use runtime::{Runtime, RuntimeHandle, unix_now};
pub use settings::{
    RuntimeSettings, SegmentSettings, Settings, load_or_init_settings, load_settings,
    open_segment_log, read_segment_store, save_settings,
};
pub use source::{ReportSource, SimulatedSource, SourceReading};
pub use store::{LiveEvent, Snapshot, StateStore, Subscription};
