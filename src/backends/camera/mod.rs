// SPDX-License-Identifier: GPL-3.0-only

//! Capture sources
//!
//! A capture source runs on its own thread and pushes every sensor frame
//! into a [`FrameSink`]. Delivery never blocks, so a slow pipeline makes the
//! source's older frames disappear rather than stalling the sensor.

pub mod frame_loop;
pub mod synthetic;
pub mod types;

pub use synthetic::{PatternGenerator, SyntheticCamera};
pub use types::*;

use crate::pipeline::FrameSink;
use std::io;

/// A producer of [`RawFrame`]s
pub trait CaptureSource: Send {
    /// Start delivering frames to `sink`. Restarts a running source.
    fn start(&mut self, sink: FrameSink) -> io::Result<()>;

    /// Stop delivering and wait for the capture thread
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}
