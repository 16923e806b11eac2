//! Headless wgpu device used for captures, kernel dispatches and transfers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{RenderError, RenderResult};

/// A headless GPU device and its queue.
pub struct RenderEngine {
    /// The wgpu instance.
    pub instance: wgpu::Instance,
    /// The wgpu adapter.
    pub adapter: wgpu::Adapter,
    /// The wgpu device.
    pub device: wgpu::Device,
    /// The wgpu queue.
    pub queue: wgpu::Queue,
    lost: Arc<AtomicBool>,
}

impl RenderEngine {
    /// Creates a new headless engine on the best available adapter.
    pub async fn new_headless() -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("voxbake device (headless)"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await?;

        let info = adapter.get_info();
        log::info!(
            "headless device on {} ({:?}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );

        let lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            log::error!("device lost ({reason:?}): {message}");
            flag.store(true, Ordering::Release);
        });

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            lost,
        })
    }

    /// Whether the device has been lost.
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    /// Shared flag that turns true when the device is lost.
    pub fn lost_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.lost)
    }

    /// Device limits in effect.
    pub fn limits(&self) -> wgpu::Limits {
        self.device.limits()
    }

    /// Checks that a volume of `resolution` fits in one storage buffer.
    pub fn check_volume_size(&self, resolution: glam::UVec3) -> RenderResult<()> {
        let limits = self.limits();
        let bytes = u64::from(resolution.x) * u64::from(resolution.y) * u64::from(resolution.z) * 4;
        if bytes > u64::from(limits.max_storage_buffer_binding_size) {
            return Err(RenderError::ExceedsLimit {
                kind: "volume buffer",
                size: resolution.to_array(),
                limit: u64::from(limits.max_storage_buffer_binding_size),
            });
        }
        Ok(())
    }

    /// Checks that a 2D target of `width` x `height` can be created.
    pub fn check_capture_size(&self, width: u32, height: u32) -> RenderResult<()> {
        let limit = self.limits().max_texture_dimension_2d;
        if width > limit || height > limit {
            return Err(RenderError::ExceedsLimit {
                kind: "capture target",
                size: [width, height, 1],
                limit: u64::from(limit),
            });
        }
        Ok(())
    }
}
