// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame capture pass: convert, process, publish, report
//!
//! Runs on the capture thread only. Every failure is final for the frame
//! that caused it; the producer just moves on to the next one.

use super::RedrawSignal;
use super::fps::FpsCounter;
use super::handoff::{FrameHandoff, PublishOutcome};
use super::metadata::{FrameMetadata, MetadataReporter};
use super::stats::PipelineStats;
use crate::backends::camera::types::{ProcessedFrame, RawFrame};
use crate::constants::DROP_LOG_INTERVAL;
use crate::errors::{BridgeError, ConvertError};
use crate::media::nv21_converter;
use crate::processing::{BridgeSession, ProcessingMode};
use std::sync::Arc;
use tracing::{trace, warn};

/// Why a frame never reached the handoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MissingPlane,
    Bridge,
    ContractViolation,
    /// Pipeline is shutting down
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    Published(FrameMetadata),
    Dropped(DropReason),
}

pub struct CaptureProducer {
    session: BridgeSession,
    handoff: Arc<FrameHandoff<ProcessedFrame>>,
    reporter: MetadataReporter,
    stats: Arc<PipelineStats>,
    redraw: Arc<dyn RedrawSignal>,
    fps: FpsCounter,
    mode: ProcessingMode,
}

impl CaptureProducer {
    /// Wrap `session` and put the bridge into `initial_mode`
    pub fn new(
        session: BridgeSession,
        handoff: Arc<FrameHandoff<ProcessedFrame>>,
        reporter: MetadataReporter,
        stats: Arc<PipelineStats>,
        redraw: Arc<dyn RedrawSignal>,
        initial_mode: ProcessingMode,
    ) -> Self {
        let mut producer = Self {
            session,
            handoff,
            reporter,
            stats,
            redraw,
            fps: FpsCounter::new(),
            mode: initial_mode,
        };
        producer.apply_mode(initial_mode);
        producer
    }

    /// Mode the next frame will be processed under
    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    pub fn apply_mode(&mut self, mode: ProcessingMode) {
        match self.session.set_mode(mode.is_edge()) {
            Ok(()) => self.mode = mode,
            Err(e) => warn!(error = %e, %mode, "Failed to set processing mode"),
        }
    }

    pub fn on_frame(&mut self, frame: &RawFrame) -> FrameOutcome {
        let (width, height) = (frame.width, frame.height);

        let (packed, report) = match nv21_converter::convert(frame) {
            Ok(converted) => converted,
            Err(ConvertError::MissingPlane(plane)) => {
                let count = self.stats.record_missing_plane();
                if should_log(count) {
                    warn!(%plane, width, height, dropped = count, "Dropping frame with missing plane");
                }
                return FrameOutcome::Dropped(DropReason::MissingPlane);
            }
        };

        if report.triggered_zero_fill() {
            let count = self.stats.record_zero_fill();
            if should_log(count) {
                warn!(
                    luma_bytes = report.zero_filled_luma_bytes,
                    chroma_samples = report.zero_filled_chroma_samples,
                    frames = count,
                    "Source frame smaller than its strides imply, zero-filled"
                );
            }
        }

        match self.session.ensure_configured(width, height) {
            Ok(true) => {
                self.stats.record_reconfiguration();
            }
            Ok(false) => {}
            Err(e) => return self.drop_for(e),
        }

        let processed = match self.session.process(&packed, frame.timestamp_ns) {
            Ok(processed) => processed,
            Err(e) => return self.drop_for(e),
        };

        match self.handoff.publish(Arc::new(processed)) {
            PublishOutcome::Rejected => return FrameOutcome::Dropped(DropReason::Closed),
            PublishOutcome::Replaced => {
                self.stats.record_replaced();
            }
            PublishOutcome::Stored => {}
        }
        self.stats.record_published();
        self.redraw.request_redraw();

        let metadata = FrameMetadata {
            fps: self.fps.update(frame.timestamp_ns),
            width,
            height,
            mode: self.mode,
        };
        if !self.reporter.report(metadata) {
            self.stats.record_metadata_dropped();
        }

        trace!(width, height, fps = metadata.fps, "Frame published");
        FrameOutcome::Published(metadata)
    }

    /// Release the bridge. Only the first call does anything.
    pub fn release(&mut self) -> bool {
        self.session.release()
    }

    fn drop_for(&self, error: BridgeError) -> FrameOutcome {
        let (reason, count) = match error {
            BridgeError::Released => return FrameOutcome::Dropped(DropReason::Closed),
            BridgeError::ContractViolation { .. } => (
                DropReason::ContractViolation,
                self.stats.record_contract_violation(),
            ),
            BridgeError::Failed(_) | BridgeError::Panicked(_) => {
                (DropReason::Bridge, self.stats.record_bridge_failure())
            }
        };
        if should_log(count) {
            warn!(error = %error, dropped = count, "Dropping frame after bridge error");
        }
        FrameOutcome::Dropped(reason)
    }
}

fn should_log(count: u64) -> bool {
    count == 1 || count % DROP_LOG_INTERVAL == 0
}
