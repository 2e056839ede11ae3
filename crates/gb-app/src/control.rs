//! One reconciliation tick: latest report in, command out, sample logged.

use std::time::Instant;

use gb_controls::{IngestOutcome, Reconciler, SkipReason};
use gb_core::ControlCommand;
use gb_results::{SegmentId, SegmentLog};
use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::store::StateStore;

/// What a tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No report has been published yet.
    Idle,
    /// The reconciler refused the input; state and command are unchanged.
    Skipped(SkipReason),
    /// A command was published. `recorded` is false when the history write
    /// failed; `sealed` names the segment the sample closed, if any.
    Applied {
        command: ControlCommand,
        recorded: bool,
        sealed: Option<SegmentId>,
    },
}

/// Drives the reconciler from the store and records history.
pub struct ControlLoop {
    reconciler: Reconciler,
    store: StateStore,
    log: SegmentLog,
    nominal_dt: f64,
    last_tick: Option<Instant>,
}

impl ControlLoop {
    /// `nominal_dt` is used as the elapsed time of the very first tick.
    pub fn new(reconciler: Reconciler, store: StateStore, log: SegmentLog, nominal_dt: f64) -> Self {
        Self {
            reconciler,
            store,
            log,
            nominal_dt,
            last_tick: None,
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn log(&self) -> &SegmentLog {
        &self.log
    }

    /// Run one tick. `now` is a monotonic instant and sets the elapsed time
    /// since the previous applied tick; `timestamp` (seconds since the Unix
    /// epoch) only stamps the recorded sample.
    ///
    /// The latest report is re-ingested even if it has not changed since the
    /// previous tick, so the integral and derivative keep evolving. A failed
    /// history write is logged and does not undo the published command.
    pub fn tick(&mut self, now: Instant, timestamp: f64) -> AppResult<TickOutcome> {
        let Some(report) = self.store.latest_report() else {
            return Ok(TickOutcome::Idle);
        };

        let dt = match self.last_tick {
            Some(last) => now.saturating_duration_since(last).as_secs_f64(),
            None => self.nominal_dt,
        };
        if let IngestOutcome::Skipped(reason) = self.reconciler.ingest(&report, dt) {
            debug!(?reason, timestamp, "tick skipped");
            return Ok(TickOutcome::Skipped(reason));
        }
        self.last_tick = Some(now);

        let command = self.reconciler.compute_command();
        self.store
            .publish_command(command, self.reconciler.describe_state());
        debug!(
            pump = command.pump_level,
            peltier = command.peltier_level,
            forward = command.peltier_forward,
            fan = command.fan_level,
            "command published"
        );

        let (recorded, sealed) = match self.log.append(report, command, timestamp) {
            Ok(sealed) => (true, sealed),
            Err(e) => {
                warn!(error = %e, timestamp, "sample not recorded");
                (false, None)
            }
        };
        if let Some(id) = &sealed {
            info!(%id, "history segment closed");
        }
        Ok(TickOutcome::Applied {
            command,
            recorded,
            sealed,
        })
    }

    /// Persist the open segment.
    pub fn flush(&self) -> AppResult<()> {
        self.log.flush()?;
        Ok(())
    }

    /// Hand back the segment log, e.g. after the runtime stops.
    pub fn into_log(self) -> SegmentLog {
        self.log
    }
}
