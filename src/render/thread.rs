// SPDX-License-Identifier: GPL-3.0-only

//! Dedicated render thread
//!
//! Owns the GPU renderer and the render target. Everything else talks to it
//! through a [`RenderHandle`], which queues [`RenderCommand`]s. Draw requests
//! are coalesced: any number of requests made while one is still queued
//! produce a single draw.

use super::renderer::FrameRenderer;
use super::target::RenderTarget;
use crate::backends::camera::frame_loop::{LoopAction, WorkerLoop};
use crate::backends::camera::types::ProcessedFrame;
use crate::errors::RenderError;
use crate::gpu::GpuContext;
use crate::pipeline::{FrameHandoff, RedrawSignal};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

pub type SnapshotReply = oneshot::Sender<Result<image::RgbaImage, RenderError>>;

pub enum RenderCommand {
    Redraw,
    Resize { width: u32, height: u32 },
    /// Host went to the background: stop drawing, keep GPU state
    Pause,
    Resume,
    /// The target is about to go away; GPU objects tied to it are dropped
    SurfaceDestroyed,
    SurfaceCreated(Box<dyn RenderTarget>),
    /// Read back what was last drawn
    Snapshot(SnapshotReply),
    Shutdown,
}

impl std::fmt::Debug for RenderCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderCommand::Redraw => write!(f, "Redraw"),
            RenderCommand::Resize { width, height } => write!(f, "Resize({}x{})", width, height),
            RenderCommand::Pause => write!(f, "Pause"),
            RenderCommand::Resume => write!(f, "Resume"),
            RenderCommand::SurfaceDestroyed => write!(f, "SurfaceDestroyed"),
            RenderCommand::SurfaceCreated(_) => write!(f, "SurfaceCreated"),
            RenderCommand::Snapshot(_) => write!(f, "Snapshot"),
            RenderCommand::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Cloneable handle to a [`RenderThread`]
#[derive(Clone)]
pub struct RenderHandle {
    commands: mpsc::UnboundedSender<RenderCommand>,
    redraw_pending: Arc<AtomicBool>,
    frames_drawn: Arc<AtomicU64>,
}

impl RenderHandle {
    fn send(&self, command: RenderCommand) -> Result<(), RenderError> {
        self.commands
            .send(command)
            .map_err(|_| RenderError::ThreadGone)
    }

    pub fn resize(&self, width: u32, height: u32) -> Result<(), RenderError> {
        self.send(RenderCommand::Resize { width, height })
    }

    pub fn pause(&self) -> Result<(), RenderError> {
        self.send(RenderCommand::Pause)
    }

    pub fn resume(&self) -> Result<(), RenderError> {
        self.send(RenderCommand::Resume)
    }

    pub fn surface_destroyed(&self) -> Result<(), RenderError> {
        self.send(RenderCommand::SurfaceDestroyed)
    }

    pub fn surface_created(&self, target: Box<dyn RenderTarget>) -> Result<(), RenderError> {
        self.send(RenderCommand::SurfaceCreated(target))
    }

    /// Read back the target contents. Blocks until the render thread has
    /// handled every command queued before this one.
    ///
    /// Must not be called from the render thread itself.
    pub fn snapshot(&self) -> Result<image::RgbaImage, RenderError> {
        let (reply, receiver) = oneshot::channel();
        self.send(RenderCommand::Snapshot(reply))?;
        receiver.blocking_recv().map_err(|_| RenderError::ThreadGone)?
    }

    /// Draws submitted to the GPU so far
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn.load(Ordering::Relaxed)
    }

    pub fn is_connected(&self) -> bool {
        !self.commands.is_closed()
    }
}

impl RedrawSignal for RenderHandle {
    fn request_redraw(&self) {
        if self.redraw_pending.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.commands.send(RenderCommand::Redraw).is_err() {
            self.redraw_pending.store(false, Ordering::Release);
        }
    }
}

/// State living on the render thread
struct RenderState {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    target: Option<Box<dyn RenderTarget>>,
    renderer: Option<FrameRenderer>,
    handoff: Arc<FrameHandoff<ProcessedFrame>>,
    commands: mpsc::UnboundedReceiver<RenderCommand>,
    /// Re-queues a draw after a transient target failure without keeping
    /// the channel open on its own
    retry: mpsc::WeakUnboundedSender<RenderCommand>,
    redraw_pending: Arc<AtomicBool>,
    frames_drawn: Arc<AtomicU64>,
    /// Last frame uploaded, re-uploaded whenever the renderer is rebuilt
    last_frame: Option<Arc<ProcessedFrame>>,
    paused: bool,
}

impl RenderState {
    fn step(&mut self) -> LoopAction {
        let Some(command) = self.commands.blocking_recv() else {
            return LoopAction::Stop;
        };

        match command {
            RenderCommand::Redraw => {
                self.redraw_pending.store(false, Ordering::Release);
                self.draw();
            }
            RenderCommand::Resize { width, height } => {
                if let Some(target) = self.target.as_mut() {
                    target.resize(&self.device, width, height);
                    let (width, height) = target.size();
                    if let Some(renderer) = self.renderer.as_mut() {
                        renderer.resize(width, height);
                    }
                }
                self.draw();
            }
            RenderCommand::Pause => {
                debug!("Render thread paused");
                self.paused = true;
            }
            RenderCommand::Resume => {
                debug!("Render thread resumed");
                self.paused = false;
                self.draw();
            }
            RenderCommand::SurfaceDestroyed => {
                let allocations = self
                    .renderer
                    .take()
                    .map_or(0, |renderer| renderer.texture_allocations());
                info!(
                    texture_allocations = allocations,
                    "Render target destroyed, releasing GPU resources"
                );
                self.target = None;
            }
            RenderCommand::SurfaceCreated(target) => {
                let (width, height) = target.size();
                info!(width, height, "Render target created");
                self.renderer = None;
                self.target = Some(target);
                self.draw();
            }
            RenderCommand::Snapshot(reply) => {
                let result = match self.target.as_ref() {
                    Some(target) => target.read_pixels(&self.device, &self.queue),
                    None => Err(RenderError::ReadbackUnsupported),
                };
                let _ = reply.send(result);
            }
            RenderCommand::Shutdown => return LoopAction::Stop,
        }
        LoopAction::Continue
    }

    fn draw(&mut self) {
        if self.paused {
            return;
        }
        let Some(target) = self.target.as_mut() else {
            return;
        };

        if self.renderer.is_none() {
            let mut renderer = FrameRenderer::new(
                Arc::clone(&self.device),
                Arc::clone(&self.queue),
                target.format(),
            );
            let (width, height) = target.size();
            renderer.resize(width, height);
            if let Some(frame) = &self.last_frame
                && let Err(e) = renderer.upload(frame)
            {
                warn!(error = %e, "Failed to restore last frame");
            }
            self.renderer = Some(renderer);
        }
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        if let Some(frame) = self.handoff.take_if_present() {
            match renderer.upload(&frame) {
                Ok(()) => self.last_frame = Some(frame),
                Err(e) => warn!(error = %e, "Frame upload failed, keeping previous frame"),
            }
        }

        let target_frame = match target.acquire(&self.device) {
            Ok(frame) => frame,
            Err(RenderError::SurfaceTimeout) => {
                debug!("Surface acquire timed out, retrying");
                self.schedule_redraw();
                return;
            }
            Err(RenderError::SurfaceLost) => {
                debug!("Render target lost, rebuilding renderer on next draw");
                self.renderer = None;
                self.schedule_redraw();
                return;
            }
            Err(e) => {
                error!(error = %e, "Failed to acquire render target");
                return;
            }
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("edgeview frame encoder"),
            });
        renderer.draw(&mut encoder, target_frame.view());
        self.queue.submit(Some(encoder.finish()));
        self.frames_drawn.fetch_add(1, Ordering::Relaxed);
    }
}

impl RenderState {
    /// Queue another draw behind whatever is already waiting
    fn schedule_redraw(&self) {
        if self.redraw_pending.swap(true, Ordering::AcqRel) {
            return;
        }
        let sent = self
            .retry
            .upgrade()
            .is_some_and(|commands| commands.send(RenderCommand::Redraw).is_ok());
        if !sent {
            self.redraw_pending.store(false, Ordering::Release);
        }
    }
}

/// Owns the render thread; shuts it down on drop
pub struct RenderThread {
    worker: Option<WorkerLoop>,
    handle: RenderHandle,
}

impl RenderThread {
    /// Start drawing frames taken from `handoff` into `target`
    pub fn spawn(
        gpu: &GpuContext,
        target: Box<dyn RenderTarget>,
        handoff: Arc<FrameHandoff<ProcessedFrame>>,
    ) -> io::Result<Self> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let redraw_pending = Arc::new(AtomicBool::new(false));
        let frames_drawn = Arc::new(AtomicU64::new(0));

        let retry = command_tx.downgrade();
        let handle = RenderHandle {
            commands: command_tx,
            redraw_pending: Arc::clone(&redraw_pending),
            frames_drawn: Arc::clone(&frames_drawn),
        };

        let init = {
            let device = Arc::clone(&gpu.device);
            let queue = Arc::clone(&gpu.queue);
            move || {
                Ok::<_, String>(RenderState {
                    device,
                    queue,
                    target: Some(target),
                    renderer: None,
                    handoff,
                    commands: command_rx,
                    retry,
                    redraw_pending,
                    frames_drawn,
                    last_frame: None,
                    paused: false,
                })
            }
        };

        let worker =
            WorkerLoop::start_with_init("edgeview-render", init, RenderState::step)?;

        Ok(Self {
            worker: Some(worker),
            handle,
        })
    }

    pub fn handle(&self) -> RenderHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|c| c.is_running())
    }

    /// Stop the thread and wait for it. Safe to call more than once.
    pub fn shutdown(&mut self) {
        let Some(mut worker) = self.worker.take() else {
            return;
        };
        let _ = self.handle.send(RenderCommand::Shutdown);
        worker.stop();
        info!(frames_drawn = self.handle.frames_drawn(), "Render thread stopped");
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::target::{OffscreenTarget, TargetFrame};
    use parking_lot::Mutex;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Arc<ProcessedFrame> {
        Arc::new(ProcessedFrame {
            width,
            height,
            data: rgba.repeat((width * height) as usize),
        })
    }

    /// Offscreen target whose next acquire can be made to fail once
    struct FlakyTarget {
        inner: OffscreenTarget,
        fail_next: Arc<Mutex<Option<RenderError>>>,
    }

    impl RenderTarget for FlakyTarget {
        fn format(&self) -> wgpu::TextureFormat {
            self.inner.format()
        }

        fn size(&self) -> (u32, u32) {
            self.inner.size()
        }

        fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
            self.inner.resize(device, width, height);
        }

        fn acquire(&mut self, device: &wgpu::Device) -> Result<TargetFrame, RenderError> {
            match self.fail_next.lock().take() {
                Some(error) => Err(error),
                None => self.inner.acquire(device),
            }
        }

        fn read_pixels(
            &self,
            device: &wgpu::Device,
            queue: &wgpu::Queue,
        ) -> Result<image::RgbaImage, RenderError> {
            self.inner.read_pixels(device, queue)
        }
    }

    type Harness = (GpuContext, RenderThread, Arc<FrameHandoff<ProcessedFrame>>);

    fn start(width: u32, height: u32) -> Option<Harness> {
        let gpu = match GpuContext::headless("render_thread_test") {
            Ok(gpu) => gpu,
            Err(e) => {
                println!("Skipping test (no GPU): {}", e);
                return None;
            }
        };
        let handoff = Arc::new(FrameHandoff::new());
        let target = Box::new(OffscreenTarget::new(&gpu.device, width, height).unwrap());
        let thread = RenderThread::spawn(&gpu, target, Arc::clone(&handoff)).unwrap();
        Some((gpu, thread, handoff))
    }

    #[test]
    fn test_draws_published_frame() {
        let Some((_gpu, thread, handoff)) = start(8, 8) else {
            return;
        };
        let handle = thread.handle();

        handoff.publish(solid(2, 2, [255, 0, 0, 255]));
        handle.request_redraw();

        let image = handle.snapshot().unwrap();
        assert_eq!(image.dimensions(), (8, 8));
        assert_eq!(image.get_pixel(4, 4).0, [255, 0, 0, 255]);
        assert!(!handoff.has_pending());
        assert!(handle.frames_drawn() >= 1);
    }

    #[test]
    fn test_paused_thread_leaves_frame_in_handoff() {
        let Some((_gpu, thread, handoff)) = start(4, 4) else {
            return;
        };
        let handle = thread.handle();
        let drawn_before = handle.frames_drawn();

        handle.pause().unwrap();
        handoff.publish(solid(2, 2, [0, 255, 0, 255]));
        handle.request_redraw();
        let _ = handle.snapshot();

        assert_eq!(handle.frames_drawn(), drawn_before);
        assert!(handoff.has_pending());

        handle.resume().unwrap();
        let image = handle.snapshot().unwrap();
        assert_eq!(image.get_pixel(2, 2).0, [0, 255, 0, 255]);
        assert!(!handoff.has_pending());
    }

    #[test]
    fn test_recreated_target_shows_last_frame() {
        let Some((gpu, thread, handoff)) = start(4, 4) else {
            return;
        };
        let handle = thread.handle();

        handoff.publish(solid(2, 2, [0, 0, 255, 255]));
        handle.request_redraw();
        handle.snapshot().unwrap();

        handle.surface_destroyed().unwrap();
        assert!(matches!(
            handle.snapshot(),
            Err(RenderError::ReadbackUnsupported)
        ));

        let target = Box::new(OffscreenTarget::new(&gpu.device, 16, 16).unwrap());
        handle.surface_created(target).unwrap();
        let image = handle.snapshot().unwrap();
        assert_eq!(image.dimensions(), (16, 16));
        assert_eq!(image.get_pixel(8, 8).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_bad_frame_keeps_previous_contents() {
        let Some((_gpu, thread, handoff)) = start(4, 4) else {
            return;
        };
        let handle = thread.handle();

        handoff.publish(solid(2, 2, [255, 255, 255, 255]));
        handle.request_redraw();
        handle.snapshot().unwrap();

        handoff.publish(Arc::new(ProcessedFrame {
            width: 2,
            height: 2,
            data: vec![0; 3],
        }));
        handle.request_redraw();
        let image = handle.snapshot().unwrap();
        assert_eq!(image.get_pixel(1, 1).0, [255, 255, 255, 255]);
    }

    fn failed_acquire_redraws_last_frame(error: RenderError) {
        let gpu = match GpuContext::headless("render_retry_test") {
            Ok(gpu) => gpu,
            Err(e) => {
                println!("Skipping test (no GPU): {}", e);
                return;
            }
        };
        let fail_next = Arc::new(Mutex::new(None));
        let target = Box::new(FlakyTarget {
            inner: OffscreenTarget::new(&gpu.device, 4, 4).unwrap(),
            fail_next: Arc::clone(&fail_next),
        });
        let handoff = Arc::new(FrameHandoff::new());
        let thread = RenderThread::spawn(&gpu, target, Arc::clone(&handoff)).unwrap();
        let handle = thread.handle();

        handoff.publish(solid(2, 2, [255, 0, 0, 255]));
        handle.request_redraw();
        assert_eq!(handle.snapshot().unwrap().get_pixel(2, 2).0, [255, 0, 0, 255]);

        *fail_next.lock() = Some(error);
        handoff.publish(solid(2, 2, [0, 255, 0, 255]));
        handle.request_redraw();

        // The failed draw queues its retry before this snapshot is answered,
        // so the second snapshot is ordered after the retried draw
        let _ = handle.snapshot();
        let image = handle.snapshot().unwrap();
        assert_eq!(image.get_pixel(2, 2).0, [0, 255, 0, 255]);
        assert!(fail_next.lock().is_none());
        assert!(!handoff.has_pending());
    }

    #[test]
    fn test_lost_target_rebuilds_and_shows_last_frame() {
        failed_acquire_redraws_last_frame(RenderError::SurfaceLost);
    }

    #[test]
    fn test_acquire_timeout_is_retried() {
        failed_acquire_redraws_last_frame(RenderError::SurfaceTimeout);
    }

    #[test]
    fn test_shutdown_disconnects_handle() {
        let Some((_gpu, mut thread, _handoff)) = start(4, 4) else {
            return;
        };
        let handle = thread.handle();
        thread.shutdown();
        thread.shutdown();

        assert!(!thread.is_running());
        assert!(matches!(handle.snapshot(), Err(RenderError::ThreadGone)));
    }
}
