// SPDX-License-Identifier: GPL-3.0-only

//! Stride-aware repacking of 4:2:0 sensor frames into NV21
//!
//! Camera hardware commonly pads luma rows and exposes chroma through
//! non-unit pixel strides (two planes aliasing one interleaved buffer).
//! The converter walks each plane with its own strides and never reads
//! outside a plane: missing luma bytes and out-of-range chroma samples
//! become zero, and every such substitution is counted in the
//! [`ConversionReport`] so callers can surface malformed sources.

use crate::backends::camera::types::{PackedFrame, Plane, PlaneKind, RawFrame};
use crate::errors::ConvertError;
use tracing::trace;

/// Zero substitutions made while converting one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionReport {
    /// Luma bytes synthesized because a source row was short
    pub zero_filled_luma_bytes: usize,
    /// Chroma samples synthesized because their index fell outside the plane
    pub zero_filled_chroma_samples: usize,
}

impl ConversionReport {
    pub fn triggered_zero_fill(&self) -> bool {
        self.zero_filled_luma_bytes > 0 || self.zero_filled_chroma_samples > 0
    }
}

/// Repack `frame` into a contiguous NV21 buffer of exactly `1.5 * width * height` bytes.
///
/// Fails only when one of the three planes is absent.
pub fn convert(frame: &RawFrame) -> Result<(PackedFrame, ConversionReport), ConvertError> {
    let y = required(frame, PlaneKind::Luma)?;
    let u = required(frame, PlaneKind::ChromaU)?;
    let v = required(frame, PlaneKind::ChromaV)?;

    let width = frame.width as usize;
    let height = frame.height as usize;
    let frame_size = width * height;

    let mut data = vec![0u8; PackedFrame::expected_len(frame.width, frame.height)];
    let mut report = ConversionReport::default();

    let (luma_out, chroma_out) = data.split_at_mut(frame_size);
    report.zero_filled_luma_bytes = copy_luma(y, width, height, luma_out);
    report.zero_filled_chroma_samples = interleave_chroma(v, u, width, height, chroma_out);

    trace!(
        width,
        height,
        luma_zero = report.zero_filled_luma_bytes,
        chroma_zero = report.zero_filled_chroma_samples,
        "Converted frame to NV21"
    );

    Ok((
        PackedFrame {
            width: frame.width,
            height: frame.height,
            data,
        },
        report,
    ))
}

fn required(frame: &RawFrame, kind: PlaneKind) -> Result<&Plane, ConvertError> {
    frame.plane(kind).ok_or(ConvertError::MissingPlane(kind))
}

/// Copy `height` rows of `width` bytes, skipping stride padding between rows.
///
/// Returns the number of bytes left zero because the plane ran out.
fn copy_luma(plane: &Plane, width: usize, height: usize, out: &mut [u8]) -> usize {
    let src = plane.bytes();
    let padding = plane.row_stride.saturating_sub(width);
    let mut cursor = 0usize;
    let mut missing = 0usize;

    for (row, dst) in out.chunks_exact_mut(width.max(1)).take(height).enumerate() {
        let remaining = src.len().saturating_sub(cursor);
        let len = width.min(remaining);
        dst[..len].copy_from_slice(&src[cursor..cursor + len]);
        cursor += len;
        missing += width - len;

        // No padding after the last row; never seek past the end.
        if row + 1 < height {
            cursor += padding.min(src.len().saturating_sub(cursor));
        }
    }

    missing
}

/// Write `height/2` rows of `width/2` (V, U) pairs, V first.
///
/// Returns the number of samples that were out of range and written as zero.
fn interleave_chroma(v: &Plane, u: &Plane, width: usize, height: usize, out: &mut [u8]) -> usize {
    let v_src = v.bytes();
    let u_src = u.bytes();
    let chroma_width = width / 2;
    let mut missing = 0usize;
    let mut pos = 0usize;

    for row in 0..height / 2 {
        for col in 0..chroma_width {
            let (v_sample, v_ok) = sample(v_src, v, row, col);
            let (u_sample, u_ok) = sample(u_src, u, row, col);
            missing += usize::from(!v_ok) + usize::from(!u_ok);

            out[pos] = v_sample;
            out[pos + 1] = u_sample;
            pos += 2;
        }
    }

    missing
}

#[inline]
fn sample(src: &[u8], plane: &Plane, row: usize, col: usize) -> (u8, bool) {
    let index = row
        .checked_mul(plane.row_stride)
        .and_then(|base| col.checked_mul(plane.pixel_stride).and_then(|c| base.checked_add(c)));

    match index.and_then(|i| src.get(i)) {
        Some(&value) => (value, true),
        None => (0, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn plane(bytes: Vec<u8>, row_stride: usize, pixel_stride: usize) -> Plane {
        Plane::new(Arc::from(bytes), row_stride, pixel_stride)
    }

    /// 4x4 planar frame with tightly packed planes
    fn planar_frame() -> RawFrame {
        RawFrame {
            width: 4,
            height: 4,
            y: Some(plane((0..16).collect(), 4, 1)),
            u: Some(plane(vec![100, 101, 102, 103], 2, 1)),
            v: Some(plane(vec![200, 201, 202, 203], 2, 1)),
            timestamp_ns: 0,
        }
    }

    #[test]
    fn test_output_size_is_one_and_a_half_pixels() {
        let (packed, report) = convert(&planar_frame()).unwrap();
        assert_eq!(packed.data.len(), 24);
        assert!(!report.triggered_zero_fill());
    }

    #[test]
    fn test_chroma_is_v_then_u() {
        let (packed, _) = convert(&planar_frame()).unwrap();
        assert_eq!(packed.luma(), (0..16).collect::<Vec<u8>>().as_slice());
        assert_eq!(
            packed.chroma(),
            &[200, 100, 201, 101, 202, 102, 203, 103]
        );
    }

    #[test]
    fn test_luma_row_padding_is_skipped() {
        // 4 wide, stride 6: two padding bytes (0xEE) after each row
        let mut bytes = Vec::new();
        for row in 0..4u8 {
            bytes.extend_from_slice(&[row * 10, row * 10 + 1, row * 10 + 2, row * 10 + 3]);
            if row < 3 {
                bytes.extend_from_slice(&[0xEE, 0xEE]);
            }
        }
        let mut frame = planar_frame();
        frame.y = Some(plane(bytes, 6, 1));

        let (packed, report) = convert(&frame).unwrap();
        assert!(!packed.luma().contains(&0xEE));
        assert_eq!(&packed.luma()[12..16], &[30, 31, 32, 33]);
        assert_eq!(report.zero_filled_luma_bytes, 0);
    }

    #[test]
    fn test_short_luma_row_is_zero_padded() {
        let mut frame = planar_frame();
        // Last row has only two bytes left
        frame.y = Some(plane(vec![9; 14], 4, 1));

        let (packed, report) = convert(&frame).unwrap();
        assert_eq!(packed.data.len(), 24);
        assert_eq!(&packed.luma()[12..16], &[9, 9, 0, 0]);
        assert_eq!(report.zero_filled_luma_bytes, 2);
    }

    #[test]
    fn test_padding_larger_than_buffer_does_not_overrun() {
        let mut frame = planar_frame();
        frame.y = Some(plane(vec![7; 6], 64, 1));

        let (packed, report) = convert(&frame).unwrap();
        assert_eq!(&packed.luma()[..4], &[7, 7, 7, 7]);
        assert!(packed.luma()[4..].iter().all(|&b| b == 0));
        assert_eq!(report.zero_filled_luma_bytes, 12);
    }

    #[test]
    fn test_missing_planes_fail() {
        for kind in [PlaneKind::Luma, PlaneKind::ChromaU, PlaneKind::ChromaV] {
            let mut frame = planar_frame();
            match kind {
                PlaneKind::Luma => frame.y = None,
                PlaneKind::ChromaU => frame.u = None,
                PlaneKind::ChromaV => frame.v = None,
            }
            assert_eq!(convert(&frame), Err(ConvertError::MissingPlane(kind)));
        }
    }

    #[test]
    fn test_semi_planar_aliasing_matches_planar() {
        // Interleaved V/U buffer exposed as two planes with pixel stride 2
        let vu: Arc<[u8]> = Arc::from(vec![200u8, 100, 201, 101, 202, 102, 203, 103]);
        let mut frame = planar_frame();
        frame.v = Some(Plane::new(Arc::clone(&vu), 4, 2));
        frame.u = Some(Plane::new(vu, 4, 2).with_offset(1));

        let (semi, _) = convert(&frame).unwrap();
        let (planar, _) = convert(&planar_frame()).unwrap();
        assert_eq!(semi, planar);
    }

    #[test]
    fn test_out_of_range_chroma_is_zero_and_counted() {
        let mut frame = planar_frame();
        frame.u = Some(plane(vec![100, 101], 2, 1));

        let (packed, report) = convert(&frame).unwrap();
        assert_eq!(&packed.chroma()[4..], &[202, 0, 203, 0]);
        assert_eq!(report.zero_filled_chroma_samples, 2);
    }

    #[test]
    fn test_absurd_stride_reads_as_zero() {
        let mut frame = planar_frame();
        frame.v = Some(plane(vec![1, 2, 3, 4], usize::MAX, usize::MAX));

        let (packed, report) = convert(&frame).unwrap();
        // Row 0, col 0 is index 0 and still valid
        assert_eq!(packed.chroma()[0], 1);
        assert_eq!(report.zero_filled_chroma_samples, 3);
    }
}
