// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic capture source
//!
//! Produces moving test patterns laid out the way sensor hardware delivers
//! them: padded luma rows, and chroma either as two planes aliasing one
//! interleaved V/U buffer (pixel stride 2) or as two separate planes.

use super::CaptureSource;
use super::frame_loop::{LoopAction, WorkerLoop};
use super::types::{ChromaLayout, Plane, RawFrame};
use crate::config::CaptureSettings;
use crate::constants::SYNTHETIC_ROW_PADDING;
use crate::pipeline::{DeliveryOutcome, FrameSink};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Builds test-pattern frames: a luma gradient scrolling diagonally with a
/// bright square sweeping across it, over slowly rotating chroma.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternGenerator {
    pub width: u32,
    pub height: u32,
    pub layout: ChromaLayout,
    /// Bytes appended to every luma row (half of it to planar chroma rows)
    pub row_padding: usize,
}

impl PatternGenerator {
    pub fn new(width: u32, height: u32, layout: ChromaLayout) -> Self {
        Self {
            width: width & !1,
            height: height & !1,
            layout,
            row_padding: SYNTHETIC_ROW_PADDING,
        }
    }

    pub fn with_row_padding(mut self, row_padding: usize) -> Self {
        self.row_padding = row_padding;
        self
    }

    pub fn luma_row_stride(&self) -> usize {
        self.width as usize + self.row_padding
    }

    /// Frame number `index` of the sequence
    pub fn frame(&self, index: u64, timestamp_ns: i64) -> RawFrame {
        let width = self.width as usize;
        let height = self.height as usize;
        let shift = (index % 256) as usize;

        let square = (height / 4).max(1);
        let travel = width.saturating_sub(square).max(1);
        let square_x = (index as usize * 4) % travel;
        let square_y = height.saturating_sub(square) / 2;

        let y_stride = self.luma_row_stride();
        let mut luma = vec![0u8; y_stride * height];
        for (row, line) in luma.chunks_exact_mut(y_stride).enumerate() {
            for (col, sample) in line[..width].iter_mut().enumerate() {
                let inside = (square_x..square_x + square).contains(&col)
                    && (square_y..square_y + square).contains(&row);
                *sample = if inside {
                    235
                } else {
                    16 + ((col + row + shift) % 96) as u8
                };
            }
        }

        let chroma_width = width / 2;
        let chroma_height = height / 2;
        let chroma_at = |col: usize, row: usize| -> (u8, u8) {
            let u = 128 + ((col + shift) % 64) as u8 - 32;
            let v = 128 + ((row + shift / 2) % 64) as u8 - 32;
            (u, v)
        };

        let (u, v) = match self.layout {
            ChromaLayout::SemiPlanar => {
                let stride = width + self.row_padding;
                let mut vu = vec![0u8; stride * chroma_height];
                for (row, line) in vu.chunks_exact_mut(stride).enumerate() {
                    for col in 0..chroma_width {
                        let (u, v) = chroma_at(col, row);
                        line[col * 2] = v;
                        line[col * 2 + 1] = u;
                    }
                }
                let vu: Arc<[u8]> = vu.into();
                let v = Plane::new(Arc::clone(&vu), stride, 2);
                let u = Plane::new(vu, stride, 2).with_offset(1);
                (u, v)
            }
            ChromaLayout::Planar => {
                let stride = chroma_width + self.row_padding / 2;
                let mut u = vec![0u8; stride * chroma_height];
                let mut v = vec![0u8; stride * chroma_height];
                for row in 0..chroma_height {
                    for col in 0..chroma_width {
                        let (cu, cv) = chroma_at(col, row);
                        u[row * stride + col] = cu;
                        v[row * stride + col] = cv;
                    }
                }
                (
                    Plane::new(u.into(), stride, 1),
                    Plane::new(v.into(), stride, 1),
                )
            }
        };

        RawFrame {
            width: self.width,
            height: self.height,
            y: Some(Plane::new(luma.into(), y_stride, 1)),
            u: Some(u),
            v: Some(v),
            timestamp_ns,
        }
    }
}

/// Capture source running a [`PatternGenerator`] on its own thread
pub struct SyntheticCamera {
    generator: PatternGenerator,
    fps: u32,
    frame_limit: Option<u64>,
    frames_delivered: Arc<AtomicU64>,
    worker: Option<WorkerLoop>,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32, fps: u32, layout: ChromaLayout) -> Self {
        Self {
            generator: PatternGenerator::new(width, height, layout),
            fps,
            frame_limit: None,
            frames_delivered: Arc::new(AtomicU64::new(0)),
            worker: None,
        }
    }

    pub fn from_settings(settings: &CaptureSettings) -> Self {
        Self::new(
            settings.width,
            settings.height,
            settings.fps,
            settings.chroma_layout,
        )
    }

    /// Stop after `frames` deliveries
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    pub fn with_row_padding(mut self, row_padding: usize) -> Self {
        self.generator = self.generator.with_row_padding(row_padding);
        self
    }

    pub fn generator(&self) -> &PatternGenerator {
        &self.generator
    }

    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered.load(Ordering::Relaxed)
    }

    /// Wait for a bounded camera to deliver its last frame
    pub fn wait(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.join();
        }
    }

    fn frame_interval(&self) -> Option<Duration> {
        (self.fps > 0).then(|| Duration::from_secs(1) / self.fps)
    }
}

impl CaptureSource for SyntheticCamera {
    fn start(&mut self, sink: FrameSink) -> io::Result<()> {
        self.stop();

        let generator = self.generator;
        let frame_limit = self.frame_limit;
        let interval = self.frame_interval();
        let delivered = Arc::clone(&self.frames_delivered);
        delivered.store(0, Ordering::Relaxed);

        info!(
            width = generator.width,
            height = generator.height,
            fps = self.fps,
            layout = generator.layout.display_name(),
            "Starting synthetic camera"
        );

        let started = Instant::now();
        let mut next_frame = started;
        let mut index = 0u64;

        let worker = WorkerLoop::start("edgeview-synthetic", move || {
            if frame_limit.is_some_and(|limit| index >= limit) {
                debug!(frames = index, "Synthetic camera reached its frame limit");
                return LoopAction::Stop;
            }

            let timestamp_ns = started.elapsed().as_nanos() as i64;
            if sink.deliver(generator.frame(index, timestamp_ns)) == DeliveryOutcome::Rejected {
                debug!("Pipeline closed, stopping synthetic camera");
                return LoopAction::Stop;
            }
            index += 1;
            delivered.fetch_add(1, Ordering::Relaxed);

            if let Some(interval) = interval {
                next_frame += interval;
                let now = Instant::now();
                if next_frame > now {
                    // Parked rather than slept so a stop request wakes us
                    thread::park_timeout(next_frame - now);
                } else {
                    next_frame = now;
                }
            }
            LoopAction::Continue
        })?;

        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }
    }

    fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|c| c.is_running())
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::nv21_converter::convert;

    #[test]
    fn test_semi_planar_chroma_aliases_one_buffer() {
        let frame = PatternGenerator::new(64, 48, ChromaLayout::SemiPlanar).frame(0, 0);
        let u = frame.u.as_ref().unwrap();
        let v = frame.v.as_ref().unwrap();

        assert!(Arc::ptr_eq(&u.data, &v.data));
        assert_eq!(u.offset, 1);
        assert_eq!(v.offset, 0);
        assert_eq!(u.pixel_stride, 2);
        assert_eq!(v.pixel_stride, 2);
    }

    #[test]
    fn test_luma_rows_are_padded() {
        let generator = PatternGenerator::new(64, 48, ChromaLayout::Planar).with_row_padding(16);
        let frame = generator.frame(3, 0);
        let y = frame.y.as_ref().unwrap();

        assert_eq!(y.row_stride, 80);
        assert_eq!(y.bytes().len(), 80 * 48);
    }

    #[test]
    fn test_layouts_convert_identically() {
        let semi = PatternGenerator::new(32, 16, ChromaLayout::SemiPlanar).frame(7, 0);
        let planar = PatternGenerator::new(32, 16, ChromaLayout::Planar).frame(7, 0);

        let (semi, semi_report) = convert(&semi).unwrap();
        let (planar, planar_report) = convert(&planar).unwrap();

        assert_eq!(semi.data, planar.data);
        assert!(!semi_report.triggered_zero_fill());
        assert!(!planar_report.triggered_zero_fill());
    }

    #[test]
    fn test_pattern_moves() {
        let generator = PatternGenerator::new(32, 16, ChromaLayout::SemiPlanar);
        let (first, _) = convert(&generator.frame(0, 0)).unwrap();
        let (second, _) = convert(&generator.frame(1, 0)).unwrap();
        assert_ne!(first.luma(), second.luma());
    }

    #[test]
    fn test_odd_dimensions_rounded_down() {
        let generator = PatternGenerator::new(33, 17, ChromaLayout::SemiPlanar);
        assert_eq!((generator.width, generator.height), (32, 16));
    }

    #[test]
    fn test_zero_fps_is_unpaced() {
        let camera = SyntheticCamera::new(16, 16, 0, ChromaLayout::Planar);
        assert!(camera.frame_interval().is_none());
        let camera = SyntheticCamera::new(16, 16, 50, ChromaLayout::Planar);
        assert_eq!(camera.frame_interval(), Some(Duration::from_millis(20)));
    }
}
