// SPDX-License-Identifier: GPL-3.0-only

//! Where the renderer draws
//!
//! The render thread only sees the [`RenderTarget`] trait. A presentable
//! target reports `SurfaceLost` when it had to be reconfigured and
//! `SurfaceTimeout` when no texture was ready; both mean "try again".

use super::check_texture_limit;
use crate::errors::RenderError;
use tracing::{debug, warn};

/// A texture acquired for one draw
pub struct TargetFrame {
    view: wgpu::TextureView,
}

impl TargetFrame {
    pub fn new(view: wgpu::TextureView) -> Self {
        Self { view }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

/// Something the render thread can draw into
pub trait RenderTarget: Send {
    fn format(&self) -> wgpu::TextureFormat;

    fn size(&self) -> (u32, u32);

    fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32);

    fn acquire(&mut self, device: &wgpu::Device) -> Result<TargetFrame, RenderError>;

    /// Copy the last drawn contents back to the CPU
    fn read_pixels(
        &self,
        _device: &wgpu::Device,
        _queue: &wgpu::Queue,
    ) -> Result<image::RgbaImage, RenderError> {
        Err(RenderError::ReadbackUnsupported)
    }
}

/// Renders into a texture that can be read back. Used headless and in tests.
pub struct OffscreenTarget {
    texture: wgpu::Texture,
    width: u32,
    height: u32,
}

impl OffscreenTarget {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    /// Allocate a `width` x `height` target. Zero sides are raised to one.
    ///
    /// Fails with [`RenderError::TextureTooLarge`] when a side exceeds the
    /// device's 2D texture limit.
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Result<Self, RenderError> {
        let (width, height) = (width.max(1), height.max(1));
        check_texture_limit(width, height, device.limits().max_texture_dimension_2d)?;
        debug!(width, height, "Offscreen target created");
        Ok(Self {
            texture: create_target_texture(device, width, height),
            width,
            height,
        })
    }
}

impl RenderTarget for OffscreenTarget {
    fn format(&self) -> wgpu::TextureFormat {
        Self::FORMAT
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if width == 0 || height == 0 || (width, height) == (self.width, self.height) {
            return;
        }
        if let Err(e) = check_texture_limit(width, height, device.limits().max_texture_dimension_2d) {
            warn!(error = %e, "Ignoring offscreen resize");
            return;
        }
        self.texture = create_target_texture(device, width, height);
        self.width = width;
        self.height = height;
    }

    fn acquire(&mut self, _device: &wgpu::Device) -> Result<TargetFrame, RenderError> {
        Ok(TargetFrame::new(
            self.texture
                .create_view(&wgpu::TextureViewDescriptor::default()),
        ))
    }

    fn read_pixels(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<image::RgbaImage, RenderError> {
        let (width, height) = (self.width, self.height);
        let unpadded_bytes_per_row = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("edgeview readback buffer"),
            size: padded_bytes_per_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("edgeview readback encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(Some(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = device.poll(wgpu::PollType::wait_indefinitely());

        pollster::block_on(receiver)
            .map_err(|e| RenderError::Readback(format!("mapping channel closed: {}", e)))?
            .map_err(|e| RenderError::Readback(e.to_string()))?;

        let pixels = {
            let data = buffer_slice.get_mapped_range();
            let mut pixels = Vec::with_capacity(unpadded_bytes_per_row as usize * height as usize);
            for row in data.chunks(padded_bytes_per_row as usize) {
                pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
            }
            pixels
        };
        staging_buffer.unmap();

        image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| RenderError::Readback("readback size mismatch".to_string()))
    }
}

fn create_target_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("edgeview offscreen target"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OffscreenTarget::FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}
