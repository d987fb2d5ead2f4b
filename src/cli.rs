// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Running the synthetic camera through the pipeline and renderer
//! - Showing the GPU adapter
//! - Showing and initializing the config file

use edgeview::backends::camera::{CaptureSource, ChromaLayout, SyntheticCamera};
use edgeview::constants::CapturePreset;
use edgeview::errors::ConfigError;
use edgeview::gpu::GpuContext;
use edgeview::pipeline::metadata::spawn_observer_thread;
use edgeview::pipeline::{FrameMetadata, Pipeline, PipelineOptions, RedrawSignal};
use edgeview::processing::ProcessingMode;
use edgeview::processing::edge::EdgeProcessor;
use edgeview::render::{OffscreenTarget, RenderHandle, RenderThread, check_texture_limit};
use edgeview::{AppError, AppResult, Config};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::info;

/// Per-run overrides of the config file
pub struct RunOptions {
    pub preset: Option<CapturePreset>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
    pub frames: u64,
    pub mode: Option<ProcessingMode>,
    pub toggle_every: u64,
    pub layout: Option<ChromaLayout>,
    pub snapshot: Option<PathBuf>,
}

/// Run the synthetic camera for `options.frames` frames
pub fn run_pipeline(mut config: Config, options: RunOptions) -> AppResult<()> {
    // Explicit width and height win over the preset
    if let Some(preset) = options.preset {
        config.capture.apply_preset(preset);
    }
    if let Some(width) = options.width {
        config.capture.width = width;
    }
    if let Some(height) = options.height {
        config.capture.height = height;
    }
    if let Some(fps) = options.fps {
        config.capture.fps = fps;
    }
    if let Some(mode) = options.mode {
        config.initial_mode = mode;
    }
    if let Some(layout) = options.layout {
        config.capture.chroma_layout = layout;
    }

    if config.capture.width < 2 || config.capture.height < 2 {
        return Err(format!(
            "Frame size {}x{} is too small",
            config.capture.width, config.capture.height
        )
        .into());
    }

    let gpu = match GpuContext::headless("edgeview") {
        Ok(gpu) => {
            println!("GPU: {} ({:?})", gpu.adapter_name(), gpu.backend());
            check_texture_limit(
                config.capture.width,
                config.capture.height,
                gpu.max_texture_dimension(),
            )?;
            Some(gpu)
        }
        Err(e) => {
            println!("GPU unavailable, running without rendering: {}", e);
            None
        }
    };

    // The render thread needs the pipeline's handoff, the pipeline needs a
    // redraw signal: bind the signal once the render thread exists.
    let render_handle: Arc<OnceLock<RenderHandle>> = Arc::new(OnceLock::new());
    let redraw = {
        let render_handle = Arc::clone(&render_handle);
        Arc::new(move || {
            if let Some(handle) = render_handle.get() {
                handle.request_redraw();
            }
        })
    };

    let bridge = EdgeProcessor::new(config.edge);
    let (mut pipeline, metadata) = Pipeline::start(bridge, PipelineOptions::from(&config), redraw)?;

    let mut render_thread = match &gpu {
        Some(gpu) => {
            let target =
                OffscreenTarget::new(&gpu.device, config.capture.width, config.capture.height)?;
            let thread = RenderThread::spawn(gpu, Box::new(target), pipeline.handoff())?;
            let _ = render_handle.set(thread.handle());
            Some(thread)
        }
        None => None,
    };

    let toggle = pipeline.mode_toggle();
    let toggle_every = options.toggle_every;
    let mut published = 0u64;
    let observer = spawn_observer_thread(metadata, move |metadata: &FrameMetadata| {
        println!("{}", metadata);
        published += 1;
        if toggle_every > 0 && published % toggle_every == 0 {
            toggle.toggle();
        }
    })?;

    println!(
        "Capturing {} frames at {}x{} ({}, {} fps), starting in {} mode",
        options.frames,
        config.capture.width,
        config.capture.height,
        config.capture.chroma_layout.display_name(),
        config.capture.fps,
        config.initial_mode
    );

    let started = Instant::now();
    let mut camera = SyntheticCamera::from_settings(&config.capture).with_frame_limit(options.frames);
    camera.start(pipeline.frame_sink())?;
    camera.wait();
    info!(
        frames = camera.frames_delivered(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Capture finished"
    );

    if let Some(path) = options.snapshot.as_deref() {
        match render_handle.get() {
            Some(handle) => save_snapshot(handle, path)?,
            None => println!("No renderer, snapshot skipped"),
        }
    }

    pipeline.shutdown();
    if let Some(thread) = render_thread.as_mut() {
        thread.shutdown();
    }
    if observer.join().is_err() {
        return Err(AppError::Other("Metadata observer panicked".to_string()));
    }

    let stats = pipeline.stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);
    if stats.frames_dropped() > 0 {
        println!("Dropped {:.1}% of processed frames", stats.drop_rate());
    }
    Ok(())
}

fn save_snapshot(handle: &RenderHandle, path: &Path) -> AppResult<()> {
    // Draw whatever the pipeline published last before reading back
    handle.request_redraw();
    let image = handle.snapshot()?;
    image.save(path)?;
    println!(
        "Snapshot saved: {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(())
}

/// Print the adapter a headless device would use
pub fn print_gpu_info() -> AppResult<()> {
    let gpu = GpuContext::headless("edgeview-info")?;
    println!("Adapter:  {}", gpu.adapter_name());
    println!("Backend:  {:?}", gpu.backend());
    println!("Max texture size: {}", gpu.max_texture_dimension());
    Ok(())
}

/// Print where the config lives and what is in effect
pub fn show_config(
    path: Option<&Path>,
    config: &Config,
    write_default: bool,
) -> AppResult<()> {
    let Some(path) = path else {
        return Err(ConfigError::NoConfigDir.into());
    };

    if write_default {
        Config::default().save(path)?;
        println!("Wrote default config to {}", path.display());
        return Ok(());
    }

    let state = if path.exists() { "" } else { " (not present, defaults)" };
    println!("Config file: {}{}", path.display(), state);
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
