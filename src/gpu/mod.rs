// SPDX-License-Identifier: GPL-3.0-only

//! GPU device creation
//!
//! One [`GpuContext`] is shared by the render thread and whoever creates its
//! targets. Devices are requested headless; targets bring their own textures.

use crate::errors::GpuError;
use std::sync::Arc;
use tracing::{debug, info};

/// Information about the created GPU device
#[derive(Debug, Clone)]
pub struct GpuDeviceInfo {
    /// Name of the GPU adapter
    pub adapter_name: String,
    /// Backend being used (Vulkan, Metal, DX12, etc.)
    pub backend: wgpu::Backend,
}

pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub info: GpuDeviceInfo,
}

impl GpuContext {
    /// Create a device with no surface attached
    pub fn headless(label: &str) -> Result<Self, GpuError> {
        let instance = new_instance();
        pollster::block_on(Self::request(instance, label))
    }

    async fn request(instance: wgpu::Instance, label: &str) -> Result<Self, GpuError> {
        info!(label = label, "Creating GPU device");

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| GpuError::NoAdapter(e.to_string()))?;

        let adapter_info = adapter.get_info();
        info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            "GPU adapter selected"
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some(label),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await
            .map_err(|e| GpuError::RequestDevice(e.to_string()))?;

        debug!(
            max_texture_dimension = device.limits().max_texture_dimension_2d,
            "GPU device created"
        );

        Ok(Self {
            instance,
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
            info: GpuDeviceInfo {
                adapter_name: adapter_info.name,
                backend: adapter_info.backend,
            },
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.info.adapter_name
    }

    pub fn backend(&self) -> wgpu::Backend {
        self.info.backend
    }

    /// Largest texture side the device accepts
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}

fn new_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::from_env().unwrap_or_else(wgpu::Backends::all),
        ..Default::default()
    })
}
