// SPDX-License-Identifier: GPL-3.0-only

//! Frame sources feeding the pipeline
//!
//! - [`camera`]: frame types, the capture thread helper and the synthetic camera

pub mod camera;
