//! gb-results: time-windowed history of reports and commands.

pub mod log;
pub mod store;
pub mod types;

pub use log::{DEFAULT_QUERY_LIMIT, DEFAULT_WINDOW_S, MEMORY_RETAINED_SEGMENTS, SegmentLog};
pub use store::SegmentStore;
pub use types::*;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Segment not found: {id}")]
    SegmentNotFound { id: String },

    #[error("Timestamp {timestamp} is not after the previous sample at {last}")]
    OutOfOrder { timestamp: f64, last: f64 },

    #[error("Timestamp is not representable: {timestamp}")]
    InvalidTimestamp { timestamp: f64 },

    #[error("Segment window must be a positive number of seconds, got {window_s}")]
    InvalidWindow { window_s: f64 },
}
