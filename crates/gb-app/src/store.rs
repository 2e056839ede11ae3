//! Shared state and live event fan-out.
//!
//! [`StateStore`] is the one place where the ingestion side, the control tick
//! and readers meet. Reads copy a [`Snapshot`] out under the lock; nothing
//! outside the store holds a reference into its state.
//!
//! Subscribers each get a bounded queue. When a queue is full the oldest
//! event is evicted so the newest always gets in, and the subscriber's drop
//! counter goes up. Publishing never blocks on a slow reader.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use gb_controls::ReconcilerView;
use gb_core::{ControlCommand, Environment, SensorReport};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{AppError, AppResult};

/// One live update, as streamed to subscribers.
///
/// Serializes as `{"report": {...}}` or `{"command": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveEvent {
    Report(SensorReport),
    Command(ControlCommand),
}

/// Consistent copy of the store's contents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// `None` until the first report arrives.
    pub report: Option<SensorReport>,
    /// Simulation ground truth, when a simulator feeds the store.
    pub environment: Option<Environment>,
    pub command: Option<ControlCommand>,
    pub reconciler: ReconcilerView,
}

struct Slot {
    sender: Sender<LiveEvent>,
    receiver: Weak<Receiver<LiveEvent>>,
    dropped: Arc<AtomicU64>,
}

impl Slot {
    /// Deliver `event`, evicting the oldest queued events if needed. Returns
    /// false once the subscriber is gone.
    fn deliver(&self, mut event: LiveEvent) -> bool {
        loop {
            match self.sender.try_send(event) {
                Ok(()) => return true,
                Err(TrySendError::Disconnected(_)) => return false,
                Err(TrySendError::Full(returned)) => {
                    let Some(receiver) = self.receiver.upgrade() else {
                        return false;
                    };
                    if receiver.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    event = returned;
                }
            }
        }
    }
}

/// Receiving end of a live event stream.
///
/// Dropping it unsubscribes; the store prunes the slot on its next publish.
pub struct Subscription {
    receiver: Arc<Receiver<LiveEvent>>,
    dropped: Arc<AtomicU64>,
}

impl Subscription {
    pub fn try_recv(&self) -> Option<LiveEvent> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<LiveEvent> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything queued right now, oldest first.
    pub fn drain(&self) -> Vec<LiveEvent> {
        self.receiver.try_iter().collect()
    }

    /// Events evicted because this subscriber fell behind.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

struct Shared {
    report: Option<SensorReport>,
    environment: Option<Environment>,
    command: Option<ControlCommand>,
    reconciler: ReconcilerView,
}

struct Inner {
    state: RwLock<Shared>,
    slots: Mutex<Vec<Slot>>,
    capacity: usize,
}

/// Latest report, environment, command and reconciler state, plus live
/// subscriptions. Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<Inner>,
}

impl StateStore {
    pub fn new(reconciler: ReconcilerView, subscriber_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(Shared {
                    report: None,
                    environment: None,
                    command: None,
                    reconciler,
                }),
                slots: Mutex::new(Vec::new()),
                capacity: subscriber_capacity.max(1),
            }),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.inner.state.read().unwrap_or_else(PoisonError::into_inner);
        Snapshot {
            report: state.report.clone(),
            environment: state.environment.clone(),
            command: state.command,
            reconciler: state.reconciler.clone(),
        }
    }

    pub fn latest_report(&self) -> Option<SensorReport> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .report
            .clone()
    }

    pub fn latest_command(&self) -> Option<ControlCommand> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .command
    }

    /// Store a new report (and the environment it was sensed from) and
    /// stream it.
    ///
    /// # Errors
    ///
    /// Rejects non-finite illumination or environment values without
    /// touching the store.
    pub fn publish_report(
        &self,
        report: SensorReport,
        environment: Option<Environment>,
    ) -> AppResult<()> {
        if !report.illumination.is_none_or(f64::is_finite) {
            return Err(AppError::InvalidInput(
                "report illumination must be finite".to_string(),
            ));
        }
        if environment.as_ref().is_some_and(|env| !env.is_finite()) {
            return Err(AppError::InvalidInput(
                "environment must be finite".to_string(),
            ));
        }
        {
            let mut state = self.inner.state.write().unwrap_or_else(PoisonError::into_inner);
            state.report = Some(report.clone());
            if environment.is_some() {
                state.environment = environment;
            }
        }
        self.broadcast(LiveEvent::Report(report));
        Ok(())
    }

    /// Replace the environment without streaming anything.
    pub fn publish_environment(&self, environment: Environment) -> AppResult<()> {
        if !environment.is_finite() {
            return Err(AppError::InvalidInput(
                "environment must be finite".to_string(),
            ));
        }
        let mut state = self.inner.state.write().unwrap_or_else(PoisonError::into_inner);
        state.environment = Some(environment);
        Ok(())
    }

    /// Store a command together with the reconciler state that produced it,
    /// then stream the command.
    pub fn publish_command(&self, command: ControlCommand, reconciler: ReconcilerView) {
        {
            let mut state = self.inner.state.write().unwrap_or_else(PoisonError::into_inner);
            state.command = Some(command);
            state.reconciler = reconciler;
        }
        self.broadcast(LiveEvent::Command(command));
    }

    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = bounded(self.inner.capacity);
        let receiver = Arc::new(receiver);
        let dropped = Arc::new(AtomicU64::new(0));
        let mut slots = self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.push(Slot {
            sender,
            receiver: Arc::downgrade(&receiver),
            dropped: Arc::clone(&dropped),
        });
        debug!(subscribers = slots.len(), "subscriber added");
        Subscription { receiver, dropped }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn broadcast(&self, event: LiveEvent) {
        let mut slots = self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let before = slots.len();
        slots.retain(|slot| slot.deliver(event.clone()));
        if slots.len() < before {
            trace!(pruned = before - slots.len(), "subscribers pruned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gb_controls::{Reconciler, ReconcilerConfig, ReconcilerTune};

    fn store(capacity: usize) -> StateStore {
        let rec = Reconciler::new(ReconcilerConfig::default(), ReconcilerTune::default()).unwrap();
        StateStore::new(rec.describe_state(), capacity)
    }

    fn report(moisture: u8) -> SensorReport {
        SensorReport {
            moisture,
            temp_inner: 20,
            humd_inner: 50,
            temp_outer: 15,
            humd_outer: 60,
            illumination: None,
        }
    }

    #[test]
    fn empty_store_has_no_report() {
        let snap = store(4).snapshot();
        assert!(snap.report.is_none());
        assert!(snap.command.is_none());
        assert!(snap.environment.is_none());
    }

    #[test]
    fn live_event_wire_shape() {
        let json = serde_json::to_value(LiveEvent::Report(report(33))).unwrap();
        assert_eq!(json["report"]["moisture"], 33);
        let json = serde_json::to_value(LiveEvent::Command(ControlCommand::off())).unwrap();
        assert_eq!(json["command"]["fan_level"], 0);
        assert_eq!(json.as_object().unwrap().len(), 1);
    }

    #[test]
    fn dropped_subscription_is_pruned() {
        let store = store(2);
        let sub = store.subscribe();
        assert_eq!(store.subscriber_count(), 1);
        drop(sub);
        store.publish_report(report(1), None).unwrap();
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn rejects_non_finite_environment() {
        let store = store(2);
        let env = Environment {
            temp_inner: f64::NAN,
            ..Environment::default()
        };
        assert!(store.publish_report(report(1), Some(env)).is_err());
        assert!(store.snapshot().report.is_none());
    }
}
