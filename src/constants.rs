// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Capture resolutions selectable with `run --preset`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CapturePreset {
    /// 640x480
    #[default]
    Vga,
    /// 1280x720
    Hd,
    /// 1920x1080
    FullHd,
}

impl CapturePreset {
    /// All presets, smallest first
    pub const ALL: [CapturePreset; 3] = [CapturePreset::Vga, CapturePreset::Hd, CapturePreset::FullHd];

    pub fn display_name(&self) -> &'static str {
        match self {
            CapturePreset::Vga => "VGA",
            CapturePreset::Hd => "720p",
            CapturePreset::FullHd => "1080p",
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            CapturePreset::Vga => (640, 480),
            CapturePreset::Hd => (1280, 720),
            CapturePreset::FullHd => (1920, 1080),
        }
    }

    /// Bytes of one NV21 frame at this preset
    pub fn packed_frame_bytes(&self) -> usize {
        let (w, h) = self.dimensions();
        let pixels = w as usize * h as usize;
        pixels + pixels / 2
    }
}

impl std::str::FromStr for CapturePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vga" | "480p" => Ok(CapturePreset::Vga),
            "hd" | "720p" => Ok(CapturePreset::Hd),
            "fullhd" | "1080p" => Ok(CapturePreset::FullHd),
            other => Err(format!("unknown preset '{}', expected vga, hd or fullhd", other)),
        }
    }
}

/// Default capture geometry and rate
pub const DEFAULT_CAPTURE_WIDTH: u32 = 640;
pub const DEFAULT_CAPTURE_HEIGHT: u32 = 480;
pub const DEFAULT_CAPTURE_FPS: u32 = 30;

/// Canny hysteresis thresholds on the L1 Sobel magnitude
pub const EDGE_LOW_THRESHOLD: u16 = 60;
pub const EDGE_HIGH_THRESHOLD: u16 = 140;

/// Undelivered metadata reports kept before new ones are dropped
pub const DEFAULT_METADATA_QUEUE_DEPTH: usize = 8;

/// Repeated drop warnings are logged on the first and every Nth occurrence
pub const DROP_LOG_INTERVAL: u64 = 300;

/// Longest the capture worker parks without a frame
pub const WORKER_IDLE_PARK: Duration = Duration::from_millis(20);

/// Row padding added by the synthetic camera, mimicking aligned sensor buffers
pub const SYNTHETIC_ROW_PADDING: usize = 32;

/// Log filter used when neither RUST_LOG nor the config sets one
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Application directory name under the platform config dir
pub const APP_DIR_NAME: &str = "edgeview";

/// Config file name inside [`APP_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.json";
