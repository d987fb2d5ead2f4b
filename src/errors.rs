// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the frame pipeline

use crate::backends::camera::types::PlaneKind;
use std::io;
use thiserror::Error;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Top-level error for the binary and for callers that do not care which stage failed
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("{0}")]
    Other(String),
}

/// Frame conversion failures.
///
/// Out-of-range reads are not errors: they are replaced with zero samples
/// and counted in [`crate::media::nv21_converter::ConversionReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("frame is missing its {0} plane")]
    MissingPlane(PlaneKind),
}

/// Which side of a bridge call broke the buffer-length contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractStage {
    Input,
    Output,
}

impl std::fmt::Display for ContractStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContractStage::Input => write!(f, "input"),
            ContractStage::Output => write!(f, "output"),
        }
    }
}

/// Processing bridge failures. All of them drop the current frame only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("processing failed: {0}")]
    Failed(String),
    #[error("processing panicked: {0}")]
    Panicked(String),
    #[error("{stage} buffer is {actual} bytes, expected {expected}")]
    ContractViolation {
        stage: ContractStage,
        expected: usize,
        actual: usize,
    },
    #[error("bridge has been released")]
    Released,
}

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no suitable GPU adapter: {0}")]
    NoAdapter(String),
    #[error("failed to create GPU device: {0}")]
    RequestDevice(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("surface lost")]
    SurfaceLost,
    #[error("timed out acquiring the next surface texture")]
    SurfaceTimeout,
    #[error("frame is {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    FrameSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("{width}x{height} frame exceeds the GPU texture limit of {max}")]
    TextureTooLarge { width: u32, height: u32, max: u32 },
    #[error("readback failed: {0}")]
    Readback(String),
    #[error("render target does not support readback")]
    ReadbackUnsupported,
    #[error("render thread is gone")]
    ThreadGone,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no config directory available on this platform")]
    NoConfigDir,
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}
