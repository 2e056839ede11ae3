//! Segment data types.

use std::fmt;

use chrono::DateTime;
use gb_core::{ControlCommand, SensorReport};
use serde::{Deserialize, Serialize};

use crate::{ResultsError, ResultsResult};

/// Identifier of a segment: `seg-YYYYMMDDTHHMMSSZ` of its window start (UTC).
///
/// Lexicographic order matches chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(String);

impl SegmentId {
    const PREFIX: &'static str = "seg-";
    const FORMAT: &'static str = "%Y%m%dT%H%M%SZ";

    /// Id for the window starting at `start_s` seconds since the Unix epoch.
    pub fn for_window_start(start_s: f64) -> ResultsResult<Self> {
        let at = DateTime::from_timestamp(start_s.floor() as i64, 0)
            .ok_or(ResultsError::InvalidTimestamp { timestamp: start_s })?;
        Ok(Self(format!("{}{}", Self::PREFIX, at.format(Self::FORMAT))))
    }

    /// Accept a stored id, checking its shape.
    pub fn parse(raw: &str) -> Option<Self> {
        let stamp = raw.strip_prefix(Self::PREFIX)?;
        chrono::NaiveDateTime::parse_from_str(stamp, Self::FORMAT).ok()?;
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One persisted record: the report, the command issued for it, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub report: SensorReport,
    pub command: ControlCommand,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

/// Samples of one fixed-width window.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub id: SegmentId,
    /// Window index: `floor(timestamp / window_s)`.
    pub window: i64,
    pub samples: Vec<Sample>,
}

impl Segment {
    pub fn last_timestamp(&self) -> Option<f64> {
        self.samples.last().map(|s| s.timestamp)
    }
}
