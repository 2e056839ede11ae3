//! Threaded runtime: an ingestion loop and a control loop sharing one store.
//!
//! Both loops wait on a `crossbeam` ticker and a stop channel. Stopping drops
//! the stop sender, which wakes both loops between iterations; an iteration
//! already running finishes first. The control thread flushes the segment
//! log before it exits.

use std::thread::{self, JoinHandle};
use std::time::Instant;

use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, bounded, select, tick};
use gb_controls::Reconciler;
use gb_core::Environment;
use gb_results::SegmentLog;
use tracing::{debug, info, warn};

use crate::control::{ControlLoop, TickOutcome};
use crate::error::{AppError, AppResult};
use crate::settings::RuntimeSettings;
use crate::source::{ReportSource, SimulatedSource};
use crate::store::StateStore;

/// Wall clock in seconds since the Unix epoch.
pub fn unix_now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1e6
}

/// Builder for a running system.
pub struct Runtime {
    settings: RuntimeSettings,
    reconciler: Reconciler,
    log: SegmentLog,
}

/// Handle to the running threads.
pub struct RuntimeHandle {
    store: StateStore,
    overrides: Option<SimulatedSource>,
    stop_tx: Option<Sender<()>>,
    ingest: Option<JoinHandle<()>>,
    control: Option<JoinHandle<AppResult<SegmentLog>>>,
}

impl Runtime {
    pub fn new(settings: RuntimeSettings, reconciler: Reconciler, log: SegmentLog) -> Self {
        Self {
            settings,
            reconciler,
            log,
        }
    }

    /// Start both loops on top of a simulator. The handle can override
    /// environment variables while running.
    pub fn spawn_simulated(self, source: SimulatedSource) -> AppResult<RuntimeHandle> {
        let overrides = source.clone();
        let mut handle = self.spawn(source)?;
        handle.overrides = Some(overrides);
        Ok(handle)
    }

    /// Start both loops on top of any report source.
    pub fn spawn<S: ReportSource + 'static>(self, source: S) -> AppResult<RuntimeHandle> {
        let Runtime {
            settings,
            reconciler,
            log,
        } = self;

        let store = StateStore::new(reconciler.describe_state(), settings.subscriber_capacity);
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let ingest = {
            let store = store.clone();
            let stop_rx = stop_rx.clone();
            let settings = settings.clone();
            thread::Builder::new()
                .name("gb-ingest".to_string())
                .spawn(move || ingest_loop(source, store, stop_rx, &settings))?
        };

        let control = {
            let nominal_dt = settings.tick_interval().as_secs_f64();
            let control = ControlLoop::new(reconciler, store.clone(), log, nominal_dt);
            let settings = settings.clone();
            thread::Builder::new()
                .name("gb-control".to_string())
                .spawn(move || control_loop(control, stop_rx, &settings))?
        };

        info!(
            tick_ms = settings.tick_interval_ms,
            ingest_ms = settings.ingest_interval_ms,
            "runtime started"
        );
        Ok(RuntimeHandle {
            store,
            overrides: None,
            stop_tx: Some(stop_tx),
            ingest: Some(ingest),
            control: Some(control),
        })
    }
}

fn ingest_loop<S: ReportSource>(
    mut source: S,
    store: StateStore,
    stop_rx: Receiver<()>,
    settings: &RuntimeSettings,
) {
    let ticker = tick(settings.ingest_interval());
    let mut last = Instant::now();
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(ticker) -> _ => {
                let now = Instant::now();
                let dt = now.duration_since(last).as_secs_f64();
                last = now;
                if let Err(e) = source.ingest(dt, &store) {
                    warn!(error = %e, "ingest failed");
                }
            }
        }
    }
    debug!("ingestion loop stopped");
}

fn control_loop(
    mut control: ControlLoop,
    stop_rx: Receiver<()>,
    settings: &RuntimeSettings,
) -> AppResult<SegmentLog> {
    let ticker = tick(settings.tick_interval());
    let mut applied = 0u64;
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(ticker) -> fired => {
                // Monotonic instant drives dt; the wall clock only stamps history
                let now = fired.unwrap_or_else(|_| Instant::now());
                match control.tick(now, unix_now()) {
                    Ok(TickOutcome::Applied { .. }) => applied += 1,
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "control tick failed"),
                }
            }
        }
    }
    control.flush()?;
    info!(applied, "control loop stopped");
    Ok(control.into_log())
}

impl RuntimeHandle {
    /// Shared store, for snapshots and subscriptions.
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Override a simulated environment variable and republish the
    /// environment.
    ///
    /// # Errors
    ///
    /// Fails with [`AppError::InvalidInput`] for unknown keys, non-finite
    /// values, or a runtime without a simulator.
    pub fn set_variable(&self, key: &str, value: f64) -> AppResult<Environment> {
        let Some(source) = &self.overrides else {
            return Err(AppError::InvalidInput(
                "no simulator attached to this runtime".to_string(),
            ));
        };
        source.set_variable_published(key, value, &self.store)
    }

    /// Stop both loops, wait for them, and return the flushed segment log.
    pub fn stop(mut self) -> AppResult<SegmentLog> {
        drop(self.stop_tx.take());
        if let Some(ingest) = self.ingest.take() {
            ingest
                .join()
                .map_err(|_| AppError::Runtime("ingestion thread panicked".to_string()))?;
        }
        let control = self
            .control
            .take()
            .ok_or_else(|| AppError::Runtime("runtime already stopped".to_string()))?;
        let log = control
            .join()
            .map_err(|_| AppError::Runtime("control thread panicked".to_string()))??;
        info!("runtime stopped");
        Ok(log)
    }
}

impl Drop for RuntimeHandle {
    fn drop(&mut self) {
        drop(self.stop_tx.take());
        if let Some(ingest) = self.ingest.take() {
            let _ = ingest.join();
        }
        if let Some(control) = self.control.take() {
            let _ = control.join();
        }
    }
}
