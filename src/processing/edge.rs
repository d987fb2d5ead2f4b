// SPDX-License-Identifier: GPL-3.0-only

//! Reference processing bridge: NV21 → RGBA with optional Canny edge detection
//!
//! In raw mode the frame is color converted (BT.601, limited range, fixed
//! point). In edge mode the converted frame is reduced to grayscale and run
//! through a Canny detector (3x3 Sobel with L1 magnitude, non-maximum
//! suppression, double threshold with hysteresis); edges are white on black.

use super::{CachedDimensions, ProcessingBridge};
use crate::backends::camera::types::{PackedFrame, ProcessedFrame};
use crate::constants::{EDGE_HIGH_THRESHOLD, EDGE_LOW_THRESHOLD};
use crate::errors::BridgeError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Canny hysteresis thresholds on the L1 gradient magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeThresholds {
    pub low: u16,
    pub high: u16,
}

impl Default for EdgeThresholds {
    fn default() -> Self {
        Self {
            low: EDGE_LOW_THRESHOLD,
            high: EDGE_HIGH_THRESHOLD,
        }
    }
}

impl EdgeThresholds {
    /// Swap the pair if given in the wrong order
    pub fn normalized(self) -> Self {
        if self.low <= self.high {
            self
        } else {
            Self {
                low: self.high,
                high: self.low,
            }
        }
    }
}

const NOT_EDGE: u8 = 0;
const WEAK: u8 = 1;
const STRONG: u8 = 2;

pub struct EdgeProcessor {
    thresholds: EdgeThresholds,
    edge_mode: bool,
    size: CachedDimensions,
    gray: Vec<u8>,
    magnitude: Vec<i32>,
    sector: Vec<u8>,
    marks: Vec<u8>,
    stack: Vec<usize>,
}

impl Default for EdgeProcessor {
    fn default() -> Self {
        Self::new(EdgeThresholds::default())
    }
}

impl EdgeProcessor {
    pub fn new(thresholds: EdgeThresholds) -> Self {
        Self {
            thresholds: thresholds.normalized(),
            edge_mode: true,
            size: CachedDimensions::default(),
            gray: Vec::new(),
            magnitude: Vec::new(),
            sector: Vec::new(),
            marks: Vec::new(),
            stack: Vec::new(),
        }
    }

    fn allocate(&mut self, width: u32, height: u32) {
        let pixels = width as usize * height as usize;
        self.gray = vec![0; pixels];
        self.magnitude = vec![0; pixels];
        self.sector = vec![0; pixels];
        self.marks = vec![NOT_EDGE; pixels];
        self.stack = Vec::with_capacity(pixels / 8);
        self.size.update(width, height);
    }

    fn detect_edges(&mut self, rgba: &mut [u8], width: usize, height: usize) {
        for (gray, px) in self.gray.iter_mut().zip(rgba.chunks_exact(4)) {
            *gray = luminance(px[0], px[1], px[2]);
        }

        sobel(
            &self.gray,
            width,
            height,
            &mut self.magnitude,
            &mut self.sector,
        );
        self.suppress_non_maxima(width, height);
        self.trace_hysteresis(width, height);

        for (px, &mark) in rgba.chunks_exact_mut(4).zip(self.marks.iter()) {
            let value = if mark == STRONG { 255 } else { 0 };
            px[0] = value;
            px[1] = value;
            px[2] = value;
            px[3] = 255;
        }
    }

    fn suppress_non_maxima(&mut self, width: usize, height: usize) {
        let low = i32::from(self.thresholds.low);
        let high = i32::from(self.thresholds.high);
        self.marks.fill(NOT_EDGE);

        for y in 1..height.saturating_sub(1) {
            for x in 1..width.saturating_sub(1) {
                let i = y * width + x;
                let m = self.magnitude[i];
                if m <= low {
                    continue;
                }

                // Neighbours along the gradient direction
                let (a, b) = match self.sector[i] {
                    0 => (i - 1, i + 1),
                    1 => (i - width - 1, i + width + 1),
                    2 => (i - width, i + width),
                    _ => (i - width + 1, i + width - 1),
                };
                if m > self.magnitude[a] && m >= self.magnitude[b] {
                    self.marks[i] = if m > high { STRONG } else { WEAK };
                }
            }
        }
    }

    fn trace_hysteresis(&mut self, width: usize, height: usize) {
        self.stack.clear();
        self.stack
            .extend((0..self.marks.len()).filter(|&i| self.marks[i] == STRONG));

        while let Some(i) = self.stack.pop() {
            let (x, y) = (i % width, i / width);
            for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                    let n = ny * width + nx;
                    if self.marks[n] == WEAK {
                        self.marks[n] = STRONG;
                        self.stack.push(n);
                    }
                }
            }
        }
    }
}

impl ProcessingBridge for EdgeProcessor {
    fn configure(&mut self, width: u32, height: u32) -> Result<(), BridgeError> {
        if width == 0 || height == 0 {
            return Err(BridgeError::Failed(format!(
                "cannot configure for {}x{}",
                width, height
            )));
        }
        if self.size.needs_update(width, height) {
            self.allocate(width, height);
        }
        info!(width, height, edge = self.edge_mode, "Edge processor configured");
        Ok(())
    }

    fn process(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
        _timestamp_ns: i64,
    ) -> Result<Vec<u8>, BridgeError> {
        if width == 0 || height == 0 {
            return Err(BridgeError::Failed("empty frame".to_string()));
        }
        if input.len() != PackedFrame::expected_len(width, height) {
            return Err(BridgeError::Failed(format!(
                "NV21 input is {} bytes, expected {}",
                input.len(),
                PackedFrame::expected_len(width, height)
            )));
        }
        if self.size.needs_update(width, height) {
            debug!(width, height, "Edge processor resizing scratch buffers");
            self.allocate(width, height);
        }

        let (w, h) = (width as usize, height as usize);
        let mut rgba = vec![0u8; ProcessedFrame::expected_len(width, height)];
        nv21_to_rgba(input, w, h, &mut rgba);

        if self.edge_mode {
            self.detect_edges(&mut rgba, w, h);
        }
        Ok(rgba)
    }

    fn set_mode(&mut self, edge: bool) {
        self.edge_mode = edge;
    }

    fn release(&mut self) {
        self.gray = Vec::new();
        self.magnitude = Vec::new();
        self.sector = Vec::new();
        self.marks = Vec::new();
        self.stack = Vec::new();
        self.size.clear();
        debug!("Edge processor released");
    }
}

/// BT.601 limited-range NV21 → RGBA, 7-bit fixed point
fn nv21_to_rgba(nv21: &[u8], width: usize, height: usize, rgba: &mut [u8]) {
    let (luma, chroma) = nv21.split_at(width * height);

    for y in 0..height {
        let chroma_row = (y / 2) * width;
        let out_row = &mut rgba[y * width * 4..(y + 1) * width * 4];

        for (x, px) in out_row.chunks_exact_mut(4).enumerate() {
            let c = chroma_row + (x / 2) * 2;
            let v = i32::from(chroma.get(c).copied().unwrap_or(128)) - 128;
            let u = i32::from(chroma.get(c + 1).copied().unwrap_or(128)) - 128;
            let l = ((i32::from(luma[y * width + x]) - 16) * 149) >> 7;

            px[0] = (l + ((179 * v) >> 7)).clamp(0, 255) as u8;
            px[1] = (l - ((44 * u) >> 7) - ((91 * v) >> 7)).clamp(0, 255) as u8;
            px[2] = (l + ((227 * u) >> 7)).clamp(0, 255) as u8;
            px[3] = 255;
        }
    }
}

#[inline]
fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((77 * u32::from(r) + 150 * u32::from(g) + 29 * u32::from(b)) >> 8) as u8
}

/// 3x3 Sobel with replicated borders.
///
/// Writes the L1 magnitude and the gradient direction quantized to four
/// sectors: 0 horizontal, 1 main diagonal, 2 vertical, 3 anti-diagonal.
fn sobel(gray: &[u8], width: usize, height: usize, magnitude: &mut [i32], sector: &mut [u8]) {
    let at = |x: isize, y: isize| -> i32 {
        let cx = x.clamp(0, width as isize - 1) as usize;
        let cy = y.clamp(0, height as isize - 1) as usize;
        i32::from(gray[cy * width + cx])
    };

    for y in 0..height as isize {
        for x in 0..width as isize {
            let gx = (at(x + 1, y - 1) + 2 * at(x + 1, y) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x - 1, y) + at(x - 1, y + 1));
            let gy = (at(x - 1, y + 1) + 2 * at(x, y + 1) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x, y - 1) + at(x + 1, y - 1));

            let i = y as usize * width + x as usize;
            let (ax, ay) = (gx.abs(), gy.abs());
            magnitude[i] = ax + ay;

            // tan(22.5°) ≈ 0.4142
            sector[i] = if ay * 10_000 < ax * 4_142 {
                0
            } else if ay * 4_142 > ax * 10_000 {
                2
            } else if (gx >= 0) == (gy >= 0) {
                1
            } else {
                3
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_frame(width: u32, height: u32, luma: u8) -> Vec<u8> {
        let mut frame = vec![luma; (width * height) as usize];
        frame.resize(PackedFrame::expected_len(width, height), 128);
        frame
    }

    /// Dark left half, bright right half
    fn step_frame(width: u32, height: u32) -> Vec<u8> {
        let mut frame = Vec::with_capacity(PackedFrame::expected_len(width, height));
        for _ in 0..height {
            for x in 0..width {
                frame.push(if x < width / 2 { 16 } else { 235 });
            }
        }
        frame.resize(PackedFrame::expected_len(width, height), 128);
        frame
    }

    #[test]
    fn test_raw_mode_converts_gray() {
        let mut processor = EdgeProcessor::default();
        processor.set_mode(false);
        processor.configure(4, 4).unwrap();

        let out = processor.process(&uniform_frame(4, 4, 128), 4, 4, 0).unwrap();
        assert_eq!(out.len(), 64);
        assert_eq!(&out[..4], &[130, 130, 130, 255]);
    }

    #[test]
    fn test_edge_mode_is_default() {
        let mut processor = EdgeProcessor::default();
        processor.configure(4, 4).unwrap();

        // Raw mode would pass the mid-gray through
        let out = processor.process(&uniform_frame(4, 4, 128), 4, 4, 0).unwrap();
        assert_eq!(&out[..4], &[0, 0, 0, 255]);
    }

    #[test]
    fn test_uniform_frame_has_no_edges() {
        let mut processor = EdgeProcessor::default();
        processor.configure(8, 8).unwrap();

        let out = processor.process(&uniform_frame(8, 8, 90), 8, 8, 0).unwrap();
        assert!(out.chunks_exact(4).all(|px| px == [0, 0, 0, 255]));
    }

    #[test]
    fn test_step_produces_vertical_edge() {
        let (w, h) = (16u32, 8u32);
        let mut processor = EdgeProcessor::default();
        processor.configure(w, h).unwrap();

        let out = processor.process(&step_frame(w, h), w, h, 0).unwrap();
        let is_edge = |x: u32, y: u32| out[((y * w + x) * 4) as usize] == 255;

        for y in 1..h - 1 {
            assert!(is_edge(7, y) || is_edge(8, y), "row {} has no edge", y);
            for x in (0..5).chain(11..w) {
                assert!(!is_edge(x, y), "unexpected edge at {},{}", x, y);
            }
        }
    }

    #[test]
    fn test_set_mode_switches_output() {
        let (w, h) = (16u32, 8u32);
        let mut processor = EdgeProcessor::default();
        processor.configure(w, h).unwrap();
        let frame = step_frame(w, h);

        let edges = processor.process(&frame, w, h, 0).unwrap();
        processor.set_mode(false);
        let raw = processor.process(&frame, w, h, 1).unwrap();

        assert_ne!(edges, raw);
        // Raw output keeps the bright half bright
        assert!(raw[((w - 1) * 4) as usize] > 200);
    }

    #[test]
    fn test_rejects_wrong_input_length() {
        let mut processor = EdgeProcessor::default();
        processor.configure(4, 4).unwrap();
        assert!(matches!(
            processor.process(&[0; 10], 4, 4, 0),
            Err(BridgeError::Failed(_))
        ));
    }

    #[test]
    fn test_unconfigured_size_is_allocated_on_demand() {
        let mut processor = EdgeProcessor::default();
        let out = processor.process(&uniform_frame(6, 4, 50), 6, 4, 0).unwrap();
        assert_eq!(out.len(), 6 * 4 * 4);
    }

    #[test]
    fn test_thresholds_are_normalized() {
        let t = EdgeThresholds { low: 200, high: 20 }.normalized();
        assert_eq!((t.low, t.high), (20, 200));
    }
}
