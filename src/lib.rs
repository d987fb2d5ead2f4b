// SPDX-License-Identifier: GPL-3.0-only

//! edgeview - live camera frames through an edge detector onto the GPU
//!
//! Frames flow through three threads:
//!
//! - capture: a [`backends::camera::CaptureSource`] delivers strided sensor frames
//! - processing: the [`pipeline::Pipeline`] worker repacks them to NV21, runs
//!   the [`processing::ProcessingBridge`] and publishes RGBA results
//! - render: the [`render::RenderThread`] uploads the newest result and draws it
//!
//! Consecutive stages are joined by a single-slot, latest-wins
//! [`pipeline::FrameHandoff`], so no stage ever waits on a slower one.
//!
//! # Modules
//!
//! - [`backends`]: frame types and capture sources
//! - [`media`]: NV21 repacking
//! - [`processing`]: the processing bridge contract and the edge detector
//! - [`pipeline`]: capture worker, handoff, metadata and mode toggle
//! - [`gpu`] / [`render`]: device creation and presentation
//! - [`config`]: user configuration

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod gpu;
pub mod media;
pub mod pipeline;
pub mod processing;
pub mod render;

// Re-export commonly used types
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use pipeline::{FrameMetadata, Pipeline, PipelineOptions};
pub use processing::ProcessingMode;
