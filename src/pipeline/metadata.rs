// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame metadata delivery from the capture thread to an observer
//!
//! The capture thread never waits on the observer: reports go through a
//! bounded channel with `try_send`, and a full channel drops the report.

use crate::processing::ProcessingMode;
use serde::{Deserialize, Serialize};
use std::io;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::debug;

/// Facts about one published frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMetadata {
    pub fps: f32,
    pub width: u32,
    pub height: u32,
    pub mode: ProcessingMode,
}

impl std::fmt::Display for FrameMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.1} FPS  {} x {}  {}",
            self.fps, self.width, self.height, self.mode
        )
    }
}

/// Anything that wants to hear about published frames
pub trait MetadataObserver: Send {
    fn on_frame_metadata(&mut self, metadata: &FrameMetadata);
}

impl<F> MetadataObserver for F
where
    F: FnMut(&FrameMetadata) + Send,
{
    fn on_frame_metadata(&mut self, metadata: &FrameMetadata) {
        self(metadata)
    }
}

/// Capture-side end of the metadata channel
#[derive(Clone)]
pub struct MetadataReporter {
    sender: mpsc::Sender<FrameMetadata>,
}

/// Observer-side end of the metadata channel
pub struct MetadataReceiver {
    receiver: mpsc::Receiver<FrameMetadata>,
}

impl MetadataReporter {
    /// Create a channel holding at most `depth` undelivered reports
    pub fn channel(depth: usize) -> (MetadataReporter, MetadataReceiver) {
        let (sender, receiver) = mpsc::channel(depth.max(1));
        (MetadataReporter { sender }, MetadataReceiver { receiver })
    }

    /// Queue a report without blocking. Returns `false` if it was dropped.
    pub fn report(&self, metadata: FrameMetadata) -> bool {
        self.sender.try_send(metadata).is_ok()
    }

    /// Whether an observer is still listening
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

impl MetadataReceiver {
    pub fn try_recv(&mut self) -> Option<FrameMetadata> {
        self.receiver.try_recv().ok()
    }

    /// Wait for the next report on a plain thread.
    ///
    /// Returns `None` once every reporter is gone. Must not be called from
    /// inside an async runtime.
    pub fn recv_blocking(&mut self) -> Option<FrameMetadata> {
        self.receiver.blocking_recv()
    }

    pub async fn recv(&mut self) -> Option<FrameMetadata> {
        self.receiver.recv().await
    }
}

/// Run `observer` on its own thread until all reporters are dropped
pub fn spawn_observer_thread<O>(
    mut receiver: MetadataReceiver,
    mut observer: O,
) -> io::Result<JoinHandle<()>>
where
    O: MetadataObserver + 'static,
{
    thread::Builder::new()
        .name("edgeview-observer".to_string())
        .spawn(move || {
            while let Some(metadata) = receiver.recv_blocking() {
                observer.on_frame_metadata(&metadata);
            }
            debug!("Metadata channel closed, observer thread exiting");
        })
}
