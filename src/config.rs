// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::types::ChromaLayout;
use crate::constants::{
    APP_DIR_NAME, CapturePreset, CONFIG_FILE_NAME, DEFAULT_CAPTURE_FPS, DEFAULT_CAPTURE_HEIGHT,
    DEFAULT_CAPTURE_WIDTH, DEFAULT_METADATA_QUEUE_DEPTH,
};
use crate::errors::ConfigError;
use crate::processing::ProcessingMode;
use crate::processing::edge::EdgeThresholds;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Capture source settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Frame width in pixels (even)
    pub width: u32,
    /// Frame height in pixels (even)
    pub height: u32,
    /// Target capture rate
    pub fps: u32,
    /// How the synthetic source lays out chroma
    pub chroma_layout: ChromaLayout,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: DEFAULT_CAPTURE_WIDTH,
            height: DEFAULT_CAPTURE_HEIGHT,
            fps: DEFAULT_CAPTURE_FPS,
            chroma_layout: ChromaLayout::default(),
        }
    }
}

impl CaptureSettings {
    /// Take width and height from `preset`, keeping rate and layout
    pub fn apply_preset(&mut self, preset: CapturePreset) {
        (self.width, self.height) = preset.dimensions();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureSettings,
    /// Mode the processing bridge starts in
    pub initial_mode: ProcessingMode,
    /// Edge detector thresholds
    pub edge: EdgeThresholds,
    /// Metadata reports buffered for a slow observer
    pub metadata_queue_depth: usize,
    /// tracing filter directive; RUST_LOG takes precedence
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureSettings::default(),
            initial_mode: ProcessingMode::Edge,
            edge: EdgeThresholds::default(),
            metadata_queue_depth: DEFAULT_METADATA_QUEUE_DEPTH,
            log_filter: None,
        }
    }
}

impl Config {
    /// `<platform config dir>/edgeview/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Read a config file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Like [`Config::load`] but never fails: unreadable files log a warning
    /// and fall back to defaults.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
            Self::default()
        })
    }

    /// Write pretty JSON, creating parent directories. Written to a temporary
    /// file first so a crash never leaves a truncated config.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}
