//! Error types for simulation operations.

use thiserror::Error;

/// Errors raised by the plant simulator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Unknown environment variable: {key}")]
    UnknownVariable { key: String },

    #[error("Non-physical condition: {what}")]
    NonPhysical { what: &'static str },
}

pub type SimResult<T> = Result<T, SimError>;

impl From<gb_core::CoreError> for SimError {
    fn from(e: gb_core::CoreError) -> Self {
        match e {
            gb_core::CoreError::UnknownVariable { key } => SimError::UnknownVariable { key },
            gb_core::CoreError::NonFinite { what, .. } => SimError::InvalidArg { what },
            gb_core::CoreError::InvalidArg { what } => SimError::InvalidArg { what },
        }
    }
}
