//! Error types for the gb-app layer.

use std::path::PathBuf;

/// Application error type wrapping the backend crates' errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Failed to read settings file: {path}")]
    SettingsFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write settings file: {path}")]
    SettingsFileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Settings validation failed: {0}")]
    Validation(String),

    #[error("Control error: {0}")]
    Control(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Results error: {0}")]
    Results(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for gb-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<gb_core::CoreError> for AppError {
    fn from(err: gb_core::CoreError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<gb_controls::ControlError> for AppError {
    fn from(err: gb_controls::ControlError) -> Self {
        AppError::Control(err.to_string())
    }
}

impl From<gb_sim::SimError> for AppError {
    fn from(err: gb_sim::SimError) -> Self {
        match err {
            gb_sim::SimError::UnknownVariable { .. } | gb_sim::SimError::InvalidArg { .. } => {
                AppError::InvalidInput(err.to_string())
            }
            gb_sim::SimError::NonPhysical { .. } => AppError::Simulation(err.to_string()),
        }
    }
}

impl From<gb_results::ResultsError> for AppError {
    fn from(err: gb_results::ResultsError) -> Self {
        AppError::Results(err.to_string())
    }
}
