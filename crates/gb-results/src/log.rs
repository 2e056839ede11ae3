//! Segment log: appends samples into fixed-width time windows.
//!
//! The log keeps one open segment in memory. With a backing store every
//! sample is also appended to the segment's partial file as it arrives. When
//! a sample lands in a later window the open segment is sealed (persisted,
//! then never touched again) and a new one starts. Without a backing store
//! the most recent sealed segments stay in memory.

use std::path::PathBuf;

use gb_core::{ControlCommand, SensorReport};
use tracing::{debug, info, warn};

use crate::store::SegmentStore;
use crate::types::{Sample, Segment, SegmentId};
use crate::{ResultsError, ResultsResult};

/// Default window width: 30 minutes.
pub const DEFAULT_WINDOW_S: f64 = 1800.0;

/// Default number of ids returned by [`SegmentLog::query`].
pub const DEFAULT_QUERY_LIMIT: i64 = 50;

/// Sealed segments an in-memory log keeps; older ones are discarded.
pub const MEMORY_RETAINED_SEGMENTS: usize = DEFAULT_QUERY_LIMIT as usize;

enum Backend {
    Memory(Vec<Segment>),
    Disk {
        store: SegmentStore,
        sealed: Vec<SegmentId>,
    },
}

pub struct SegmentLog {
    window_s: f64,
    backend: Backend,
    open: Option<Segment>,
}

fn check_window(window_s: f64) -> ResultsResult<()> {
    if window_s.is_finite() && window_s > 0.0 {
        Ok(())
    } else {
        Err(ResultsError::InvalidWindow { window_s })
    }
}

impl SegmentLog {
    /// Log that keeps everything in memory.
    pub fn in_memory(window_s: f64) -> ResultsResult<Self> {
        check_window(window_s)?;
        Ok(Self {
            window_s,
            backend: Backend::Memory(Vec::new()),
            open: None,
        })
    }

    /// Log persisted under `dir`.
    ///
    /// Existing sealed segments are listed; the newest partial segment, if
    /// any, becomes the open segment again. Older partials (left behind by an
    /// interrupted run) are sealed as they are.
    pub fn open(dir: PathBuf, window_s: f64) -> ResultsResult<Self> {
        check_window(window_s)?;
        let store = SegmentStore::new(dir)?;

        let mut partials = store.list_partial()?;
        let resumed = match partials.pop() {
            Some(id) => {
                let samples = store.load(&id)?;
                // Rewrite so a torn tail is not followed by new appends
                store.write_partial(&id, &samples)?;
                Self::resume(id, samples, window_s)
            }
            None => None,
        };
        for stale in partials {
            warn!(id = %stale, "sealing stale partial segment");
            let samples = store.load(&stale)?;
            store.write_sealed(&stale, &samples)?;
        }

        let sealed = store.list_sealed()?;
        info!(
            dir = %store.root_dir().display(),
            sealed = sealed.len(),
            resumed = resumed.is_some(),
            "segment log opened"
        );
        Ok(Self {
            window_s,
            backend: Backend::Disk { store, sealed },
            open: resumed,
        })
    }

    fn resume(id: SegmentId, samples: Vec<Sample>, window_s: f64) -> Option<Segment> {
        let first = samples.first()?.timestamp;
        let window = (first / window_s).floor() as i64;
        debug!(%id, samples = samples.len(), "resuming partial segment");
        Some(Segment {
            id,
            window,
            samples,
        })
    }

    pub fn window_s(&self) -> f64 {
        self.window_s
    }

    pub fn open_segment(&self) -> Option<&Segment> {
        self.open.as_ref()
    }

    fn sealed_ids(&self) -> Vec<SegmentId> {
        match &self.backend {
            Backend::Memory(segments) => segments.iter().map(|s| s.id.clone()).collect(),
            Backend::Disk { sealed, .. } => sealed.clone(),
        }
    }

    /// Append one sample.
    ///
    /// Returns the id of the segment sealed by this append, if the sample
    /// opened a new window.
    ///
    /// # Errors
    ///
    /// Non-finite or non-increasing timestamps are rejected and nothing is
    /// recorded.
    pub fn append(
        &mut self,
        report: SensorReport,
        command: ControlCommand,
        timestamp: f64,
    ) -> ResultsResult<Option<SegmentId>> {
        if !timestamp.is_finite() {
            return Err(ResultsError::InvalidTimestamp { timestamp });
        }
        if let Some(last) = self.open.as_ref().and_then(Segment::last_timestamp)
            && timestamp <= last
        {
            return Err(ResultsError::OutOfOrder { timestamp, last });
        }

        let window = (timestamp / self.window_s).floor() as i64;
        let mut sealed = None;
        if let Some(segment) = self.open.take_if(|s| s.window != window) {
            sealed = Some(self.seal(segment)?);
        }

        if self.open.is_none() {
            let id = SegmentId::for_window_start(window as f64 * self.window_s)?;
            debug!(%id, "segment opened");
            self.open = Some(Segment {
                id,
                window,
                samples: Vec::new(),
            });
        }
        if let Some(open) = self.open.as_mut() {
            let sample = Sample {
                report,
                command,
                timestamp,
            };
            if let Backend::Disk { store, .. } = &self.backend {
                store.append_partial(&open.id, &sample)?;
            }
            open.samples.push(sample);
        }
        Ok(sealed)
    }

    /// Move `segment` into the sealed set. On a failed write it stays open.
    fn seal(&mut self, segment: Segment) -> ResultsResult<SegmentId> {
        let id = segment.id.clone();
        match &mut self.backend {
            Backend::Memory(segments) => {
                segments.push(segment);
                if segments.len() > MEMORY_RETAINED_SEGMENTS {
                    let evicted = segments.remove(0);
                    debug!(id = %evicted.id, "in-memory segment evicted");
                }
            }
            Backend::Disk { store, sealed } => {
                if let Err(e) = store.write_sealed(&segment.id, &segment.samples) {
                    self.open = Some(segment);
                    return Err(e);
                }
                sealed.push(id.clone());
            }
        }
        info!(%id, "segment sealed");
        Ok(id)
    }

    /// Up to `n` segment ids, most recent first; the open segment leads when
    /// `include_open` is set. `n <= 0` yields nothing.
    pub fn query(&self, n: i64, include_open: bool) -> Vec<SegmentId> {
        let Ok(limit) = usize::try_from(n) else {
            return Vec::new();
        };
        let open = self
            .open
            .iter()
            .filter(|_| include_open)
            .map(|s| s.id.clone());
        open.chain(self.sealed_ids().into_iter().rev())
            .take(limit)
            .collect()
    }

    /// Rewrite the open segment's partial file in one piece. Samples are
    /// already appended as they arrive; this compacts the file on shutdown.
    pub fn flush(&self) -> ResultsResult<()> {
        if let (Backend::Disk { store, .. }, Some(open)) = (&self.backend, &self.open) {
            store.write_partial(&open.id, &open.samples)?;
            debug!(id = %open.id, samples = open.samples.len(), "open segment flushed");
        }
        Ok(())
    }

    /// Samples of a segment, open or sealed.
    pub fn load(&self, id: &SegmentId) -> ResultsResult<Vec<Sample>> {
        if let Some(open) = self.open.as_ref().filter(|s| &s.id == id) {
            return Ok(open.samples.clone());
        }
        match &self.backend {
            Backend::Memory(segments) => segments
                .iter()
                .find(|s| &s.id == id)
                .map(|s| s.samples.clone())
                .ok_or_else(|| ResultsError::SegmentNotFound { id: id.to_string() }),
            Backend::Disk { store, .. } => store.load(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> SensorReport {
        SensorReport {
            moisture: 30,
            temp_inner: 20,
            humd_inner: 50,
            temp_outer: 15,
            humd_outer: 60,
            illumination: Some(100.0),
        }
    }

    #[test]
    fn non_positive_query_is_empty() {
        let mut log = SegmentLog::in_memory(10.0).unwrap();
        log.append(report(), ControlCommand::off(), 1.0).unwrap();
        log.append(report(), ControlCommand::off(), 11.0).unwrap();
        assert!(log.query(0, true).is_empty());
        assert!(log.query(-5, true).is_empty());
    }

    #[test]
    fn rejects_non_increasing_timestamps() {
        let mut log = SegmentLog::in_memory(10.0).unwrap();
        log.append(report(), ControlCommand::off(), 5.0).unwrap();
        assert!(matches!(
            log.append(report(), ControlCommand::off(), 5.0),
            Err(ResultsError::OutOfOrder { .. })
        ));
        assert!(log.append(report(), ControlCommand::off(), f64::NAN).is_err());
        assert_eq!(log.open_segment().unwrap().samples.len(), 1);
    }

    #[test]
    fn memory_log_keeps_latest_segments() {
        let mut log = SegmentLog::in_memory(1.0).unwrap();
        let total = MEMORY_RETAINED_SEGMENTS + 10;
        for i in 0..=total {
            log.append(report(), ControlCommand::off(), i as f64 + 0.5)
                .unwrap();
        }
        let sealed = log.query(i64::MAX, false);
        assert_eq!(sealed.len(), MEMORY_RETAINED_SEGMENTS);
        let oldest = SegmentId::for_window_start(0.0).unwrap();
        assert!(matches!(
            log.load(&oldest),
            Err(ResultsError::SegmentNotFound { .. })
        ));
        let newest = SegmentId::for_window_start((total - 1) as f64).unwrap();
        assert_eq!(sealed[0], newest);
    }

    #[test]
    fn invalid_window_rejected() {
        assert!(SegmentLog::in_memory(0.0).is_err());
        assert!(SegmentLog::in_memory(f64::INFINITY).is_err());
    }
}
