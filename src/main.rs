// SPDX-License-Identifier: GPL-3.0-only

use clap::{Args, Parser, Subcommand};
use edgeview::backends::camera::ChromaLayout;
use edgeview::constants::{CapturePreset, DEFAULT_LOG_FILTER};
use edgeview::{AppResult, Config};
use edgeview::processing::ProcessingMode;
use std::path::PathBuf;
use tracing::warn;

mod cli;

#[derive(Parser)]
#[command(name = "edgeview")]
#[command(about = "Live camera frames through an edge detector onto the GPU")]
#[command(version = env!("EDGEVIEW_BUILD_VERSION"))]
struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    config_file: Option<PathBuf>,

    /// Log filter, e.g. "edgeview=debug" (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the synthetic camera through the pipeline and an offscreen renderer
    Run(RunArgs),

    /// Show the GPU adapter that would be used
    Gpu,

    /// Show the config file location and effective settings
    Config {
        /// Write a config file with default settings
        #[arg(long)]
        write_default: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Frame size preset: vga, hd or fullhd
    #[arg(short, long)]
    preset: Option<CapturePreset>,

    /// Frame width (overrides the preset)
    #[arg(long)]
    width: Option<u32>,

    /// Frame height (overrides the preset)
    #[arg(long)]
    height: Option<u32>,

    /// Capture rate (0 = as fast as possible)
    #[arg(long)]
    fps: Option<u32>,

    /// Number of frames to capture
    #[arg(short = 'n', long, default_value = "300")]
    frames: u64,

    /// Starting mode: edge or raw
    #[arg(short, long)]
    mode: Option<ProcessingMode>,

    /// Flip the mode every N published frames (0 = never)
    #[arg(long, default_value = "0")]
    toggle_every: u64,

    /// Chroma layout of the synthetic camera: semi or planar
    #[arg(long)]
    layout: Option<ChromaLayout>,

    /// Save the last rendered frame as PNG
    #[arg(short, long)]
    snapshot: Option<PathBuf>,
}

fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config_file
        .clone()
        .or_else(|| Config::default_path().ok());
    let (config, config_error) = match config_path.as_deref() {
        Some(path) => match Config::load(path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        },
        None => (Config::default(), None),
    };

    // Initialize logging
    // RUST_LOG wins, then --log, then the config file
    // Examples: RUST_LOG=debug, RUST_LOG=edgeview=debug, RUST_LOG=info
    let fallback_filter = cli
        .log
        .clone()
        .or_else(|| config.log_filter.clone())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&fallback_filter)),
        )
        .with_target(true)
        .with_level(true)
        .init();

    if let Some(e) = config_error {
        warn!(error = %e, "Ignoring unreadable config, using defaults");
    }

    match cli.command {
        Commands::Run(args) => cli::run_pipeline(
            config,
            cli::RunOptions {
                preset: args.preset,
                width: args.width,
                height: args.height,
                fps: args.fps,
                frames: args.frames,
                mode: args.mode,
                toggle_every: args.toggle_every,
                layout: args.layout,
                snapshot: args.snapshot,
            },
        ),
        Commands::Gpu => cli::print_gpu_info(),
        Commands::Config { write_default } => {
            cli::show_config(config_path.as_deref(), &config, write_default)
        }
    }
}
