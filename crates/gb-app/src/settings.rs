//! Settings file: loading, saving and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use gb_controls::{ReconcilerConfig, ReconcilerTune};
use gb_results::{DEFAULT_WINDOW_S, SegmentLog, SegmentStore};
use gb_sim::PlantParams;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult};

/// Thread cadences and subscriber queue size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Period of the reconciliation tick.
    pub tick_interval_ms: u64,
    /// Period of the ingestion loop.
    pub ingest_interval_ms: u64,
    /// Events buffered per subscriber before the oldest is dropped.
    pub subscriber_capacity: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            ingest_interval_ms: 1000,
            subscriber_capacity: 8,
        }
    }
}

impl RuntimeSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn ingest_interval(&self) -> Duration {
        Duration::from_millis(self.ingest_interval_ms)
    }
}

/// Where and how history is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentSettings {
    /// Directory of segment files.
    pub dir: PathBuf,
    /// Window width in seconds.
    pub window_s: f64,
    /// Keep segments in memory only.
    pub in_memory: bool,
}

impl Default for SegmentSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data/segments"),
            window_s: DEFAULT_WINDOW_S,
            in_memory: false,
        }
    }
}

/// Everything a run needs, as stored in the YAML settings file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub reconciler: ReconcilerConfig,
    pub tune: ReconcilerTune,
    pub plant: PlantParams,
    pub runtime: RuntimeSettings,
    pub segments: SegmentSettings,
}

impl Settings {
    /// Reject settings a run cannot start with.
    pub fn validate(&self) -> AppResult<()> {
        self.reconciler
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        self.tune
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        self.plant
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if self.runtime.tick_interval_ms == 0 || self.runtime.ingest_interval_ms == 0 {
            return Err(AppError::Validation(
                "runtime intervals must be at least 1 ms".to_string(),
            ));
        }
        if self.runtime.subscriber_capacity == 0 {
            return Err(AppError::Validation(
                "subscriber_capacity must be at least 1".to_string(),
            ));
        }
        if !(self.segments.window_s.is_finite() && self.segments.window_s > 0.0) {
            return Err(AppError::Validation(format!(
                "segment window must be positive, got {}",
                self.segments.window_s
            )));
        }
        Ok(())
    }
}

/// Load and validate settings from a YAML file.
pub fn load_settings(path: &Path) -> AppResult<Settings> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::SettingsFileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let settings: Settings = serde_yaml::from_str(&content)
        .map_err(|e| AppError::Settings(format!("Failed to parse settings YAML: {}", e)))?;

    settings.validate()?;
    Ok(settings)
}

/// Save settings to a YAML file.
pub fn save_settings(path: &Path, settings: &Settings) -> AppResult<()> {
    let content = serde_yaml::to_string(settings)
        .map_err(|e| AppError::Settings(format!("Failed to serialize settings: {}", e)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content).map_err(|e| AppError::SettingsFileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

/// Load settings, writing the defaults first if the file does not exist.
pub fn load_or_init_settings(path: &Path) -> AppResult<Settings> {
    if !path.exists() {
        info!(path = %path.display(), "writing default settings");
        save_settings(path, &Settings::default())?;
    }
    load_settings(path)
}

/// Open the segment log described by the settings.
pub fn open_segment_log(settings: &SegmentSettings) -> AppResult<SegmentLog> {
    let log = if settings.in_memory {
        SegmentLog::in_memory(settings.window_s)?
    } else {
        SegmentLog::open(settings.dir.clone(), settings.window_s)?
    };
    Ok(log)
}

/// Read-only view of the persisted segments, for listing and inspection.
///
/// `None` when history is kept in memory or nothing has been written yet.
/// Unlike [`open_segment_log`] this never creates, seals or rewrites files.
pub fn read_segment_store(settings: &SegmentSettings) -> AppResult<Option<SegmentStore>> {
    if settings.in_memory || !settings.dir.is_dir() {
        return Ok(None);
    }
    Ok(Some(SegmentStore::new(settings.dir.clone())?))
}
