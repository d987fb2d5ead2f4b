// SPDX-License-Identifier: GPL-3.0-only

//! GPU presentation of processed frames
//!
//! - [`FrameRenderer`]: shader program, frame texture and the quad draw
//! - [`RenderTarget`]: what the renderer draws into; [`OffscreenTarget`] reads back
//! - [`RenderThread`]: the thread that owns both and reacts to [`RenderCommand`]s

pub mod renderer;
pub mod target;
pub mod thread;

pub use renderer::FrameRenderer;
pub use target::{OffscreenTarget, RenderTarget, TargetFrame};
pub use thread::{RenderCommand, RenderHandle, RenderThread};

use crate::errors::RenderError;

/// Reject texture extents the device cannot allocate
pub fn check_texture_limit(width: u32, height: u32, max: u32) -> Result<(), RenderError> {
    if width > max || height > max {
        return Err(RenderError::TextureTooLarge { width, height, max });
    }
    Ok(())
}
