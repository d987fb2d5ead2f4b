// SPDX-License-Identifier: GPL-3.0-only

//! Capture → processing → handoff pipeline
//!
//! # Threads
//!
//! ```text
//!  capture source ──deliver──▶ FrameSink (latest-wins inbox)
//!                                   │ unpark
//!                                   ▼
//!                      edgeview-capture worker
//!              convert → bridge → FrameHandoff ──▶ render thread
//!                                   │
//!                                   └──metadata──▶ observer
//! ```
//!
//! The capture source never waits on the worker: an undelivered frame is
//! replaced by the next one. The worker owns the bridge and is the only thread
//! that calls it; mode toggles reach it as commands applied between frames.

pub mod fps;
pub mod handoff;
pub mod metadata;
pub mod mode;
pub mod producer;
pub mod stats;

pub use handoff::{FrameHandoff, PublishOutcome};
pub use metadata::{FrameMetadata, MetadataObserver, MetadataReceiver, MetadataReporter};
pub use mode::ModeToggle;
pub use producer::{CaptureProducer, DropReason, FrameOutcome};
pub use stats::{PipelineStats, StatsSnapshot};

use crate::backends::camera::frame_loop::{LoopAction, WorkerLoop};
use crate::backends::camera::types::{ProcessedFrame, RawFrame};
use crate::config::Config;
use crate::constants::{DEFAULT_METADATA_QUEUE_DEPTH, WORKER_IDLE_PARK};
use crate::errors::PipelineError;
use crate::processing::{BridgeSession, ProcessingBridge, ProcessingMode};
use std::sync::{Arc, OnceLock};
use std::thread::{self, Thread};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Asks whoever owns the display to draw again
pub trait RedrawSignal: Send + Sync {
    fn request_redraw(&self);
}

impl<F> RedrawSignal for F
where
    F: Fn() + Send + Sync,
{
    fn request_redraw(&self) {
        self()
    }
}

/// Messages from other threads to the capture worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCommand {
    SetMode(ProcessingMode),
}

/// Unparks the capture worker once it exists
#[derive(Debug, Default)]
pub struct WorkerWaker {
    thread: OnceLock<Thread>,
}

impl WorkerWaker {
    fn register(&self, thread: Thread) {
        let _ = self.thread.set(thread);
    }

    pub fn wake(&self) {
        if let Some(thread) = self.thread.get() {
            thread.unpark();
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub initial_mode: ProcessingMode,
    pub metadata_queue_depth: usize,
    /// Longest the worker sleeps without a frame before rechecking commands
    pub idle_park: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            initial_mode: ProcessingMode::default(),
            metadata_queue_depth: DEFAULT_METADATA_QUEUE_DEPTH,
            idle_park: WORKER_IDLE_PARK,
        }
    }
}

impl From<&Config> for PipelineOptions {
    fn from(config: &Config) -> Self {
        Self {
            initial_mode: config.initial_mode,
            metadata_queue_depth: config.metadata_queue_depth,
            ..Self::default()
        }
    }
}

/// Result of [`FrameSink::deliver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Accepted,
    /// An older frame the worker had not started was discarded
    ReplacedPending,
    /// The pipeline is shut down
    Rejected,
}

/// Capture-source end of the pipeline. Cheap to clone, never blocks.
#[derive(Clone)]
pub struct FrameSink {
    inbox: Arc<FrameHandoff<RawFrame>>,
    waker: Arc<WorkerWaker>,
    stats: Arc<PipelineStats>,
}

impl FrameSink {
    pub fn deliver(&self, frame: RawFrame) -> DeliveryOutcome {
        let outcome = match self.inbox.publish(Arc::new(frame)) {
            PublishOutcome::Rejected => return DeliveryOutcome::Rejected,
            PublishOutcome::Stored => DeliveryOutcome::Accepted,
            PublishOutcome::Replaced => {
                self.stats.record_skipped();
                DeliveryOutcome::ReplacedPending
            }
        };
        self.stats.record_received();
        self.waker.wake();
        outcome
    }

    pub fn is_open(&self) -> bool {
        !self.inbox.is_closed()
    }
}

/// State that lives on the capture worker thread
struct CaptureWorker {
    producer: CaptureProducer,
    commands: mpsc::UnboundedReceiver<WorkerCommand>,
    inbox: Arc<FrameHandoff<RawFrame>>,
    idle_park: Duration,
}

impl CaptureWorker {
    fn step(&mut self) -> LoopAction {
        // Commands are drained after the take: a toggle queued before a frame
        // was delivered applies to that frame
        let frame = self.inbox.take_if_present();
        while let Ok(command) = self.commands.try_recv() {
            match command {
                WorkerCommand::SetMode(mode) => self.producer.apply_mode(mode),
            }
        }

        match frame {
            Some(frame) => {
                self.producer.on_frame(&frame);
            }
            None => thread::park_timeout(self.idle_park),
        }
        LoopAction::Continue
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        // Runs on the worker thread after its last frame
        self.producer.release();
    }
}

/// A running capture pipeline
pub struct Pipeline {
    worker: Option<WorkerLoop>,
    inbox: Arc<FrameHandoff<RawFrame>>,
    handoff: Arc<FrameHandoff<ProcessedFrame>>,
    toggle: ModeToggle,
    stats: Arc<PipelineStats>,
    waker: Arc<WorkerWaker>,
}

impl Pipeline {
    /// Take ownership of `bridge` and start the capture worker.
    ///
    /// The bridge is put into `options.initial_mode` on the worker thread
    /// before the first frame. Returns the pipeline and the receiving end of
    /// its metadata channel.
    pub fn start<B>(
        bridge: B,
        options: PipelineOptions,
        redraw: Arc<dyn RedrawSignal>,
    ) -> Result<(Self, MetadataReceiver), PipelineError>
    where
        B: ProcessingBridge + 'static,
    {
        let inbox = Arc::new(FrameHandoff::new());
        let handoff = Arc::new(FrameHandoff::new());
        let stats = Arc::new(PipelineStats::new());
        let waker = Arc::new(WorkerWaker::default());
        let (reporter, receiver) = MetadataReporter::channel(options.metadata_queue_depth);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let toggle = ModeToggle::new(options.initial_mode, command_tx, Arc::clone(&waker));

        let init = {
            let inbox = Arc::clone(&inbox);
            let handoff = Arc::clone(&handoff);
            let stats = Arc::clone(&stats);
            move || {
                let producer = CaptureProducer::new(
                    BridgeSession::new(bridge),
                    handoff,
                    reporter,
                    stats,
                    redraw,
                    options.initial_mode,
                );
                Ok::<_, String>(CaptureWorker {
                    producer,
                    commands: command_rx,
                    inbox,
                    idle_park: options.idle_park,
                })
            }
        };

        let worker =
            WorkerLoop::start_with_init("edgeview-capture", init, CaptureWorker::step)?;
        if let Some(thread) = worker.thread() {
            waker.register(thread);
        }

        info!(mode = %options.initial_mode, "Pipeline started");

        Ok((
            Self {
                worker: Some(worker),
                inbox,
                handoff,
                toggle,
                stats,
                waker,
            },
            receiver,
        ))
    }

    /// Where capture sources deliver frames
    pub fn frame_sink(&self) -> FrameSink {
        FrameSink {
            inbox: Arc::clone(&self.inbox),
            waker: Arc::clone(&self.waker),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Processed frames ready for display
    pub fn handoff(&self) -> Arc<FrameHandoff<ProcessedFrame>> {
        Arc::clone(&self.handoff)
    }

    pub fn mode_toggle(&self) -> ModeToggle {
        self.toggle.clone()
    }

    pub fn toggle_mode(&self) -> ProcessingMode {
        self.toggle.toggle()
    }

    pub fn mode(&self) -> ProcessingMode {
        self.toggle.current()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|c| c.is_running())
    }

    /// Stop the pipeline. Safe to call more than once.
    ///
    /// Stops accepting frames, waits for the worker to finish its current
    /// frame and release the bridge, then empties the display handoff.
    pub fn shutdown(&mut self) {
        let Some(mut worker) = self.worker.take() else {
            return;
        };

        self.inbox.close();
        worker.stop();
        self.handoff.close();

        let stats = self.stats.snapshot();
        info!(
            published = stats.frames_published,
            dropped = stats.frames_dropped(),
            skipped = stats.frames_skipped,
            "Pipeline shut down"
        );
        debug!(?stats, "Final pipeline stats");
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
