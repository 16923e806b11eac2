//! GPU implementation of the sweep backend.

use glam::{UVec2, UVec3};
use voxbake_core::{
    AllocationTracker, FilterHint, KernelPass, KernelUniforms, PixelFormat, SweepBackend,
    VolumeDescriptor, VoxelError,
};

use crate::buffer::scoped_allocation;
use crate::engine::RenderEngine;
use crate::error::RenderResult;
use crate::image::{texture_format, GpuImage, GpuStorage};
use crate::kernel::AccumulationKernel;

/// Pixel format of accumulated volumes.
pub const VOLUME_FORMAT: PixelFormat = PixelFormat::Rgba8Unorm;

/// Render target for one slab capture.
#[derive(Debug)]
pub struct GpuCaptureBuffer {
    image: GpuImage,
    view: wgpu::TextureView,
}

impl GpuCaptureBuffer {
    pub fn texture(&self) -> &wgpu::Texture {
        match self.image.storage() {
            GpuStorage::Texture(texture) => texture,
            GpuStorage::Buffer(_) => unreachable!("capture buffers are textures"),
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Width and height in pixels.
    pub fn size(&self) -> UVec2 {
        self.image.size().truncate()
    }

    pub fn format(&self) -> PixelFormat {
        self.image.format()
    }

    /// Hands the capture over for materialization.
    pub fn into_image(self) -> GpuImage {
        self.image
    }
}

/// Volume accumulated on the device, stored as packed rgba8 texels.
#[derive(Debug)]
pub struct GpuVolume {
    image: GpuImage,
}

impl GpuVolume {
    pub fn buffer(&self) -> &wgpu::Buffer {
        match self.image.storage() {
            GpuStorage::Buffer(buffer) => buffer,
            GpuStorage::Texture(_) => unreachable!("volumes are buffers"),
        }
    }

    pub fn resolution(&self) -> UVec3 {
        self.image.size()
    }

    /// Hands the volume over for materialization.
    pub fn into_image(self) -> GpuImage {
        self.image
    }
}

/// Sweep backend running captures and the accumulation kernel on a wgpu
/// device.
pub struct GpuBackend<'a> {
    engine: &'a RenderEngine,
    kernel: AccumulationKernel,
    capture_format: PixelFormat,
    presence_threshold: f32,
    allocations: AllocationTracker,
}

impl<'a> GpuBackend<'a> {
    /// Creates a backend compiling the kernel for `work_group_size`.
    pub fn new(
        engine: &'a RenderEngine,
        capture_format: PixelFormat,
        work_group_size: UVec3,
    ) -> RenderResult<Self> {
        let kernel = AccumulationKernel::new(&engine.device, work_group_size)?;
        Ok(Self {
            engine,
            kernel,
            capture_format,
            presence_threshold: 0.0,
            allocations: AllocationTracker::new(),
        })
    }

    /// Alpha above which a capture pixel counts as geometry.
    #[must_use]
    pub fn with_presence_threshold(mut self, threshold: f32) -> Self {
        self.presence_threshold = threshold;
        self
    }

    /// Uses `tracker` for all subsequent allocations.
    #[must_use]
    pub fn with_tracker(mut self, tracker: AllocationTracker) -> Self {
        self.allocations = tracker;
        self
    }

    pub fn engine(&self) -> &'a RenderEngine {
        self.engine
    }

    pub fn capture_format(&self) -> PixelFormat {
        self.capture_format
    }

    pub fn presence_threshold(&self) -> f32 {
        self.presence_threshold
    }

    fn check_device(&self) -> voxbake_core::Result<()> {
        if self.engine.is_lost() {
            return Err(VoxelError::Backend("device lost".into()));
        }
        Ok(())
    }
}

impl SweepBackend for GpuBackend<'_> {
    type CaptureTarget = GpuCaptureBuffer;
    type Volume = GpuVolume;

    fn allocate_volume(&mut self, descriptor: &VolumeDescriptor) -> voxbake_core::Result<GpuVolume> {
        self.check_device()?;
        let resolution = descriptor.resolution();
        self.engine.check_volume_size(resolution)?;

        let size = descriptor.voxel_count() as u64 * u64::from(VOLUME_FORMAT.bytes_per_pixel());
        let buffer = scoped_allocation(&self.engine.device, "volume buffer", |device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Volume Buffer"),
                size,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })?;

        let image = GpuImage::from_buffer(buffer, resolution, VOLUME_FORMAT, FilterHint::Nearest)
            .as_volume()
            .with_guard(self.allocations.acquire("volume"));
        Ok(GpuVolume { image })
    }

    fn allocate_capture(&mut self, size: UVec2) -> voxbake_core::Result<GpuCaptureBuffer> {
        self.check_device()?;
        self.engine.check_capture_size(size.x, size.y)?;

        let format = self.capture_format;
        let texture = scoped_allocation(&self.engine.device, "capture target", |device| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Capture Target"),
                size: wgpu::Extent3d {
                    width: size.x,
                    height: size.y,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: texture_format(format),
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        })?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let image = GpuImage::from_texture(texture, format, FilterHint::Nearest)
            .with_guard(self.allocations.acquire("capture"));
        Ok(GpuCaptureBuffer { image, view })
    }

    fn dispatch_kernel(
        &mut self,
        volume: &mut GpuVolume,
        pass: KernelPass<'_, GpuCaptureBuffer>,
        groups: UVec3,
    ) -> voxbake_core::Result<()> {
        self.check_device()?;
        let resolution = volume.resolution();
        let (uniforms, capture) = match pass {
            KernelPass::Clear => (KernelUniforms::clear(resolution), None),
            KernelPass::Accumulate {
                capture,
                axis,
                slice,
            } => {
                let expected = axis.swizzle().capture_size(resolution);
                if capture.size() != expected {
                    return Err(VoxelError::SizeMismatch {
                        expected: expected.element_product() as usize,
                        actual: capture.size().element_product() as usize,
                    });
                }
                (
                    KernelUniforms::accumulate(
                        resolution,
                        axis,
                        slice,
                        self.presence_threshold,
                    ),
                    Some(capture.view()),
                )
            }
        };

        self.kernel.dispatch(
            &self.engine.device,
            &self.engine.queue,
            volume.buffer(),
            capture,
            &uniforms,
            groups,
        );
        Ok(())
    }

    fn work_group_size(&self) -> UVec3 {
        self.kernel.work_group_size()
    }

    fn allocations(&self) -> &AllocationTracker {
        &self.allocations
    }
}
