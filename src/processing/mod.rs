// SPDX-License-Identifier: GPL-3.0-only

//! Pixel processing stage
//!
//! A [`ProcessingBridge`] is a stateful transform from NV21 to RGBA. It is
//! configured by frame size, switched between [`ProcessingMode`]s, called once
//! per frame and released when the pipeline stops. The pipeline never talks to
//! a bridge directly: [`BridgeSession`] owns it on the capture thread, caches the
//! configured size and enforces the buffer-length contract on every call.

pub mod edge;
pub mod session;

pub use edge::EdgeProcessor;
pub use session::BridgeSession;

use crate::errors::BridgeError;
use serde::{Deserialize, Serialize};

/// What the bridge does with each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    /// Edge detection
    #[default]
    Edge,
    /// Plain color conversion
    Raw,
}

impl ProcessingMode {
    pub const ALL: [ProcessingMode; 2] = [ProcessingMode::Edge, ProcessingMode::Raw];

    pub fn from_edge(is_edge: bool) -> Self {
        if is_edge {
            ProcessingMode::Edge
        } else {
            ProcessingMode::Raw
        }
    }

    pub fn is_edge(self) -> bool {
        self == ProcessingMode::Edge
    }

    pub fn toggled(self) -> Self {
        match self {
            ProcessingMode::Edge => ProcessingMode::Raw,
            ProcessingMode::Raw => ProcessingMode::Edge,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProcessingMode::Edge => "EDGE",
            ProcessingMode::Raw => "RAW",
        }
    }
}

impl std::fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for ProcessingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "edge" => Ok(ProcessingMode::Edge),
            "raw" => Ok(ProcessingMode::Raw),
            other => Err(format!("unknown mode '{}', expected edge or raw", other)),
        }
    }
}

/// Stateful NV21 → RGBA transform
///
/// Calls arrive from a single thread, in this order: `configure` before the
/// first `process` of a given size, any number of `process` and `set_mode`
/// calls, then `release` exactly once.
pub trait ProcessingBridge: Send {
    /// Prepare for frames of `width` x `height`. Safe to repeat with the same size.
    fn configure(&mut self, width: u32, height: u32) -> Result<(), BridgeError>;

    /// Transform one NV21 frame of `1.5 * width * height` bytes into
    /// `4 * width * height` bytes of RGBA.
    fn process(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
        timestamp_ns: i64,
    ) -> Result<Vec<u8>, BridgeError>;

    /// Select edge (`true`) or raw (`false`) output for subsequent `process` calls
    fn set_mode(&mut self, edge: bool);

    /// Free everything the bridge holds. Terminal.
    fn release(&mut self);
}

impl<B: ProcessingBridge + ?Sized> ProcessingBridge for Box<B> {
    fn configure(&mut self, width: u32, height: u32) -> Result<(), BridgeError> {
        (**self).configure(width, height)
    }

    fn process(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
        timestamp_ns: i64,
    ) -> Result<Vec<u8>, BridgeError> {
        (**self).process(input, width, height, timestamp_ns)
    }

    fn set_mode(&mut self, edge: bool) {
        (**self).set_mode(edge)
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Last frame size a resource was prepared for
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub struct CachedDimensions {
    pub width: u32,
    pub height: u32,
}

impl CachedDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Check if dimensions have changed and need update
    pub fn needs_update(&self, width: u32, height: u32) -> bool {
        self.width != width || self.height != height
    }

    pub fn update(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Check if dimensions are initialized (non-zero)
    pub fn is_initialized(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}
