// SPDX-License-Identifier: GPL-3.0-only

//! Shared frame types

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Identifies one of the three planes of a 4:2:0 sensor frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneKind {
    /// Full-resolution luminance
    Luma,
    /// Blue-difference chroma (Cb)
    ChromaU,
    /// Red-difference chroma (Cr)
    ChromaV,
}

impl std::fmt::Display for PlaneKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaneKind::Luma => write!(f, "luma"),
            PlaneKind::ChromaU => write!(f, "chroma-u"),
            PlaneKind::ChromaV => write!(f, "chroma-v"),
        }
    }
}

/// How a capture source lays out the two chroma planes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChromaLayout {
    /// U and V interleaved in one buffer, exposed as two planes with pixel stride 2
    #[default]
    SemiPlanar,
    /// U and V in separate buffers with pixel stride 1
    Planar,
}

impl ChromaLayout {
    pub const ALL: [ChromaLayout; 2] = [ChromaLayout::SemiPlanar, ChromaLayout::Planar];

    pub fn display_name(&self) -> &'static str {
        match self {
            ChromaLayout::SemiPlanar => "semi-planar",
            ChromaLayout::Planar => "planar",
        }
    }
}

impl std::str::FromStr for ChromaLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "semi" | "semi-planar" | "semiplanar" => Ok(ChromaLayout::SemiPlanar),
            "planar" => Ok(ChromaLayout::Planar),
            other => Err(format!("unknown chroma layout '{}', expected semi or planar", other)),
        }
    }
}

/// One plane of a sensor frame.
///
/// `data` is reference counted so the two chroma planes of a semi-planar
/// source can alias the same allocation at different offsets.
#[derive(Clone)]
pub struct Plane {
    pub data: Arc<[u8]>,
    /// Byte offset of the plane's first sample within `data`
    pub offset: usize,
    /// Bytes between the starts of consecutive rows
    pub row_stride: usize,
    /// Bytes between consecutive samples within a row
    pub pixel_stride: usize,
}

impl Plane {
    pub fn new(data: Arc<[u8]>, row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            offset: 0,
            row_stride,
            pixel_stride,
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Addressable bytes of this plane. Empty when the offset is past the end.
    pub fn bytes(&self) -> &[u8] {
        self.data.get(self.offset..).unwrap_or(&[])
    }
}

impl std::fmt::Debug for Plane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plane")
            .field("len", &self.bytes().len())
            .field("offset", &self.offset)
            .field("row_stride", &self.row_stride)
            .field("pixel_stride", &self.pixel_stride)
            .finish()
    }
}

/// One sensor capture in multi-plane, strided form
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub y: Option<Plane>,
    pub u: Option<Plane>,
    pub v: Option<Plane>,
    /// Capture time on the device's monotonic clock
    pub timestamp_ns: i64,
}

impl RawFrame {
    pub fn plane(&self, kind: PlaneKind) -> Option<&Plane> {
        match kind {
            PlaneKind::Luma => self.y.as_ref(),
            PlaneKind::ChromaU => self.u.as_ref(),
            PlaneKind::ChromaV => self.v.as_ref(),
        }
    }
}

/// Contiguous NV21 buffer: full luma plane, then interleaved V/U at quarter resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl PackedFrame {
    pub fn expected_len(width: u32, height: u32) -> usize {
        let frame_size = width as usize * height as usize;
        frame_size + frame_size / 2
    }

    pub fn luma(&self) -> &[u8] {
        let frame_size = self.width as usize * self.height as usize;
        &self.data[..frame_size.min(self.data.len())]
    }

    pub fn chroma(&self) -> &[u8] {
        let frame_size = self.width as usize * self.height as usize;
        self.data.get(frame_size..).unwrap_or(&[])
    }
}

/// RGBA output of the processing bridge
#[derive(Clone, PartialEq, Eq)]
pub struct ProcessedFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl ProcessedFrame {
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 4
    }

    pub fn is_well_formed(&self) -> bool {
        self.data.len() == Self::expected_len(self.width, self.height)
    }
}

impl std::fmt::Debug for ProcessedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ProcessedFrame({}x{}, {} bytes)",
            self.width,
            self.height,
            self.data.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_offset_past_end_is_empty() {
        let data: Arc<[u8]> = Arc::from(vec![1u8, 2, 3]);
        let plane = Plane::new(data, 3, 1).with_offset(8);
        assert!(plane.bytes().is_empty());
    }

    #[test]
    fn test_aliased_planes_share_storage() {
        let data: Arc<[u8]> = Arc::from(vec![10u8, 20, 30, 40]);
        let v = Plane::new(Arc::clone(&data), 4, 2);
        let u = Plane::new(Arc::clone(&data), 4, 2).with_offset(1);
        assert_eq!(v.bytes(), &[10, 20, 30, 40]);
        assert_eq!(u.bytes(), &[20, 30, 40]);
        assert_eq!(Arc::strong_count(&data), 3);
    }

    #[test]
    fn test_packed_frame_accessors() {
        let frame = PackedFrame {
            width: 4,
            height: 2,
            data: (0..12).collect(),
        };
        assert_eq!(PackedFrame::expected_len(4, 2), 12);
        assert_eq!(frame.luma().len(), 8);
        assert_eq!(frame.chroma(), &[8, 9, 10, 11]);
    }

    #[test]
    fn test_processed_frame_well_formed() {
        let frame = ProcessedFrame {
            width: 2,
            height: 2,
            data: vec![0; 16],
        };
        assert!(frame.is_well_formed());
    }
}
