// SPDX-License-Identifier: GPL-3.0-only

//! Pixel format conversion
//!
//! Sensor frames arrive as three strided 4:2:0 planes. The [`nv21_converter`]
//! repacks them into the contiguous NV21 layout the processing bridge expects.

pub mod nv21_converter;

pub use nv21_converter::{ConversionReport, convert};
