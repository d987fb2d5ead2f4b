// SPDX-License-Identifier: GPL-3.0-only

//! Textured full-surface quad for processed frames
//!
//! One RGBA texture holds the most recently uploaded frame. Every draw
//! samples it across the whole viewport, whether or not a new frame arrived
//! since the previous draw, so the last good frame stays on screen.

use super::check_texture_limit;
use crate::backends::camera::types::ProcessedFrame;
use crate::errors::RenderError;
use crate::processing::CachedDimensions;
use std::sync::Arc;
use tracing::{debug, info};

const QUAD_SHADER: &str = include_str!("quad.wgsl");

pub struct FrameRenderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    texture_format: wgpu::TextureFormat,
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    texture_size: CachedDimensions,
    /// Frame textures created since the placeholder
    texture_allocations: u64,
    viewport: (u32, u32),
}

impl FrameRenderer {
    /// Build the program, sampler and a 1x1 black placeholder texture for a
    /// target of `target_format`
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        target_format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("edgeview quad shader"),
            source: wgpu::ShaderSource::Wgsl(QUAD_SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("edgeview frame bind group layout"),
            entries: &[
                // Frame texture
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("edgeview quad pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("edgeview quad pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("edgeview frame sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        // Camera bytes are already gamma encoded: let an sRGB target see them as such
        let texture_format = if target_format.is_srgb() {
            wgpu::TextureFormat::Rgba8UnormSrgb
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        };

        let texture = create_frame_texture(&device, texture_format, 1, 1);
        let bind_group = create_bind_group(&device, &bind_group_layout, &texture, &sampler);
        write_pixels(&queue, &texture, 1, 1, &[0, 0, 0, 255]);

        info!(format = ?target_format, "Frame renderer initialized");

        Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            sampler,
            texture_format,
            texture,
            bind_group,
            texture_size: CachedDimensions::new(1, 1),
            texture_allocations: 0,
            viewport: (1, 1),
        }
    }

    /// Track the target size. The frame texture is left alone.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Dimensions of the texture currently sampled
    pub fn texture_size(&self) -> (u32, u32) {
        (self.texture_size.width, self.texture_size.height)
    }

    pub fn texture_allocations(&self) -> u64 {
        self.texture_allocations
    }

    /// Replace the texture contents with `frame`.
    ///
    /// GPU textures have fixed extents, so a frame of a different size gets a
    /// new texture object; same-size frames overwrite in place.
    pub fn upload(&mut self, frame: &ProcessedFrame) -> Result<(), RenderError> {
        let (width, height) = (frame.width, frame.height);
        let expected = ProcessedFrame::expected_len(width, height);
        if width == 0 || height == 0 || frame.data.len() != expected {
            return Err(RenderError::FrameSize {
                width,
                height,
                expected,
                actual: frame.data.len(),
            });
        }

        check_texture_limit(width, height, self.device.limits().max_texture_dimension_2d)?;

        if self.texture_size.needs_update(width, height) {
            self.texture_allocations += 1;
            debug!(
                width,
                height,
                allocations = self.texture_allocations,
                "Reallocating frame texture"
            );
            self.texture = create_frame_texture(&self.device, self.texture_format, width, height);
            self.bind_group = create_bind_group(
                &self.device,
                &self.bind_group_layout,
                &self.texture,
                &self.sampler,
            );
            self.texture_size.update(width, height);
        }

        write_pixels(&self.queue, &self.texture, width, height, &frame.data);
        Ok(())
    }

    /// Record a pass that clears `view` and draws the quad over the viewport
    pub fn draw(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("edgeview quad pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let (width, height) = self.viewport;
        if width == 0 || height == 0 {
            return;
        }
        pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..6, 0..1);
    }
}

fn create_frame_texture(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("edgeview frame texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    texture: &wgpu::Texture,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("edgeview frame bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

fn write_pixels(queue: &wgpu::Queue, texture: &wgpu::Texture, width: u32, height: u32, data: &[u8]) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::GpuContext;
    use crate::render::target::OffscreenTarget;

    fn validate_shader(name: &str, source: &str) {
        let result = naga::front::wgsl::parse_str(source);
        match result {
            Ok(module) => {
                let info = naga::valid::Validator::new(
                    naga::valid::ValidationFlags::all(),
                    naga::valid::Capabilities::all(),
                )
                .validate(&module);

                if let Err(e) = info {
                    panic!("Shader '{}' validation failed: {:?}", name, e);
                }
            }
            Err(e) => {
                panic!("Shader '{}' parse failed: {:?}", name, e);
            }
        }
    }

    #[test]
    fn test_quad_shader_validates() {
        validate_shader("quad", QUAD_SHADER);
    }

    fn renderer() -> Option<(GpuContext, FrameRenderer)> {
        let gpu = match GpuContext::headless("renderer_test") {
            Ok(gpu) => gpu,
            Err(e) => {
                println!("Skipping test (no GPU): {}", e);
                return None;
            }
        };
        let renderer = FrameRenderer::new(
            Arc::clone(&gpu.device),
            Arc::clone(&gpu.queue),
            OffscreenTarget::FORMAT,
        );
        Some((gpu, renderer))
    }

    fn frame(width: u32, height: u32) -> ProcessedFrame {
        ProcessedFrame {
            width,
            height,
            data: vec![128; ProcessedFrame::expected_len(width, height)],
        }
    }

    #[test]
    fn test_resize_changes_viewport_only() {
        let Some((_gpu, mut renderer)) = renderer() else {
            return;
        };

        renderer.upload(&frame(8, 6)).unwrap();
        assert_eq!(renderer.texture_size(), (8, 6));
        assert_eq!(renderer.texture_allocations(), 1);

        renderer.resize(1920, 1080);
        assert_eq!(renderer.viewport(), (1920, 1080));
        assert_eq!(renderer.texture_size(), (8, 6));
        assert_eq!(renderer.texture_allocations(), 1);

        // Same-size frames overwrite the existing texture
        renderer.upload(&frame(8, 6)).unwrap();
        assert_eq!(renderer.texture_allocations(), 1);

        renderer.upload(&frame(4, 4)).unwrap();
        assert_eq!(renderer.texture_size(), (4, 4));
        assert_eq!(renderer.texture_allocations(), 2);
    }

    #[test]
    fn test_rejected_upload_keeps_texture() {
        let Some((gpu, mut renderer)) = renderer() else {
            return;
        };
        renderer.upload(&frame(2, 2)).unwrap();

        let mut short = frame(2, 2);
        short.data.pop();
        assert!(matches!(
            renderer.upload(&short),
            Err(RenderError::FrameSize { expected: 16, actual: 15, .. })
        ));

        let too_wide = gpu.max_texture_dimension() + 1;
        let oversized = ProcessedFrame {
            width: too_wide,
            height: 1,
            data: vec![0; ProcessedFrame::expected_len(too_wide, 1)],
        };
        assert!(matches!(
            renderer.upload(&oversized),
            Err(RenderError::TextureTooLarge { .. })
        ));
        assert_eq!(renderer.texture_size(), (2, 2));
        assert_eq!(renderer.texture_allocations(), 1);
    }

    #[test]
    fn test_quad_shader_entry_points() {
        let module = naga::front::wgsl::parse_str(QUAD_SHADER).unwrap();
        let names: Vec<_> = module.entry_points.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"vs_main"));
        assert!(names.contains(&"fs_main"));
    }
}
