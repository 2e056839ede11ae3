//! Error types for control operations.

use thiserror::Error;

/// Result type for control operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur while building or configuring controllers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Invalid argument provided to a control function.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Tuning parameter out of range.
    #[error("Invalid tuning for {channel}: {what}")]
    InvalidTune {
        channel: &'static str,
        what: &'static str,
    },

    /// Reconciler configuration out of range.
    #[error("Invalid reconciler config: {what}")]
    InvalidConfig { what: &'static str },
}
