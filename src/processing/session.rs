// SPDX-License-Identifier: GPL-3.0-only

//! Owned processing bridge with size cache and contract checks

use super::{CachedDimensions, ProcessingBridge};
use crate::backends::camera::types::{PackedFrame, ProcessedFrame};
use crate::errors::{BridgeError, ContractStage};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, info, warn};

/// A processing bridge owned by the capture thread.
///
/// Reconfigures only when the frame size changes, validates both buffer
/// lengths around every `process` call, contains panics raised by the bridge,
/// and releases it exactly once (explicitly or on drop).
pub struct BridgeSession {
    bridge: Option<Box<dyn ProcessingBridge>>,
    configured: CachedDimensions,
}

impl BridgeSession {
    pub fn new<B: ProcessingBridge + 'static>(bridge: B) -> Self {
        Self {
            bridge: Some(Box::new(bridge)),
            configured: CachedDimensions::default(),
        }
    }

    /// Size the bridge is currently configured for
    pub fn configured_size(&self) -> Option<(u32, u32)> {
        self.configured
            .is_initialized()
            .then_some((self.configured.width, self.configured.height))
    }

    pub fn is_released(&self) -> bool {
        self.bridge.is_none()
    }

    /// Configure the bridge for `width` x `height` unless it already is.
    ///
    /// Returns whether `configure` was actually called. A failed configure
    /// leaves the cache empty so the next frame retries.
    pub fn ensure_configured(&mut self, width: u32, height: u32) -> Result<bool, BridgeError> {
        if self.configured.is_initialized() && !self.configured.needs_update(width, height) {
            return Ok(false);
        }

        let bridge = self.bridge.as_mut().ok_or(BridgeError::Released)?;
        self.configured.clear();
        contain(|| bridge.configure(width, height))??;
        self.configured.update(width, height);

        info!(width, height, "Processing bridge configured");
        Ok(true)
    }

    /// Run the bridge on one packed frame.
    ///
    /// The bridge must already be configured for the frame's size.
    pub fn process(
        &mut self,
        packed: &PackedFrame,
        timestamp_ns: i64,
    ) -> Result<ProcessedFrame, BridgeError> {
        let bridge = self.bridge.as_mut().ok_or(BridgeError::Released)?;
        let (width, height) = (packed.width, packed.height);

        check_len(
            ContractStage::Input,
            PackedFrame::expected_len(width, height),
            packed.data.len(),
        )?;

        let data = contain(|| bridge.process(&packed.data, width, height, timestamp_ns))??;

        check_len(
            ContractStage::Output,
            ProcessedFrame::expected_len(width, height),
            data.len(),
        )?;

        Ok(ProcessedFrame {
            width,
            height,
            data,
        })
    }

    pub fn set_mode(&mut self, edge: bool) -> Result<(), BridgeError> {
        let bridge = self.bridge.as_mut().ok_or(BridgeError::Released)?;
        contain(|| bridge.set_mode(edge))?;
        debug!(edge, "Processing bridge mode set");
        Ok(())
    }

    /// Release the bridge and clear the size cache.
    ///
    /// Returns `true` only for the call that performed the release.
    pub fn release(&mut self) -> bool {
        let Some(mut bridge) = self.bridge.take() else {
            return false;
        };
        self.configured.clear();

        if let Err(e) = contain(|| bridge.release()) {
            warn!(error = %e, "Processing bridge panicked during release");
        }
        info!("Processing bridge released");
        true
    }
}

impl Drop for BridgeSession {
    fn drop(&mut self) {
        self.release();
    }
}

fn check_len(stage: ContractStage, expected: usize, actual: usize) -> Result<(), BridgeError> {
    if expected == actual {
        Ok(())
    } else {
        Err(BridgeError::ContractViolation {
            stage,
            expected,
            actual,
        })
    }
}

/// Run a bridge call, turning a panic into [`BridgeError::Panicked`]
fn contain<T>(f: impl FnOnce() -> T) -> Result<T, BridgeError> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .map_err(|payload| BridgeError::Panicked(panic_message(&*payload)))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
