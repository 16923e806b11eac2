//! Host-memory reference backend.
//!
//! Executes the accumulation kernel contract invocation by invocation, the
//! same way the GPU dispatch does, so sweeps can be checked without a
//! device. [`AabbScene`] is an analytic scene of solid boxes for it.

use glam::{UVec2, UVec3, Vec3, Vec4};

use crate::backend::{CaptureError, SceneCapture, SweepBackend};
use crate::descriptor::VolumeDescriptor;
use crate::dispatch::{invocations, DEFAULT_WORK_GROUP_SIZE};
use crate::error::Result;
use crate::image::{FilterHint, MaterializedImage, PixelFormat};
use crate::kernel::{combine, Invocation, KernelPass, KernelUniforms, BACKGROUND};
use crate::resource::{AllocationGuard, AllocationTracker};
use crate::rig::CapturePose;

/// A 2D capture target in host memory.
#[derive(Debug)]
pub struct CpuCaptureBuffer {
    size: UVec2,
    pixels: Vec<[f32; 4]>,
    _guard: AllocationGuard,
}

impl CpuCaptureBuffer {
    pub fn size(&self) -> UVec2 {
        self.size
    }

    /// Fills every pixel with `color`.
    pub fn fill(&mut self, color: [f32; 4]) {
        self.pixels.fill(color);
    }

    /// Pixel at `pixel`.
    pub fn pixel(&self, pixel: UVec2) -> [f32; 4] {
        self.pixels[(pixel.x + pixel.y * self.size.x) as usize]
    }

    /// Writes the pixel at `pixel`.
    pub fn set_pixel(&mut self, pixel: UVec2, color: [f32; 4]) {
        let index = (pixel.x + pixel.y * self.size.x) as usize;
        self.pixels[index] = color;
    }
}

/// A 3D volume in host memory.
#[derive(Debug)]
pub struct CpuVolume {
    resolution: UVec3,
    voxels: Vec<[f32; 4]>,
    _guard: AllocationGuard,
}

impl CpuVolume {
    pub fn resolution(&self) -> UVec3 {
        self.resolution
    }

    fn index(&self, voxel: UVec3) -> usize {
        let r = self.resolution;
        (voxel.x + r.x * (voxel.y + r.y * voxel.z)) as usize
    }

    /// Value stored at `voxel`.
    pub fn voxel(&self, voxel: UVec3) -> [f32; 4] {
        self.voxels[self.index(voxel)]
    }

    /// Whether `voxel` holds geometry.
    pub fn is_present(&self, voxel: UVec3, threshold: f32) -> bool {
        self.voxel(voxel)[3] > threshold
    }

    /// Number of voxels holding geometry.
    pub fn present_count(&self, threshold: f32) -> usize {
        self.voxels.iter().filter(|v| v[3] > threshold).count()
    }

    /// Copies the volume into an 8-bit RGBA image.
    pub fn to_image(&self) -> Result<MaterializedImage> {
        let data = self
            .voxels
            .iter()
            .flat_map(|v| v.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
            .collect();
        MaterializedImage::volume(
            self.resolution,
            PixelFormat::Rgba8Unorm,
            FilterHint::Nearest,
            data,
        )
    }
}

/// Reference implementation of [`SweepBackend`] on host memory.
#[derive(Debug, Clone)]
pub struct CpuBackend {
    allocations: AllocationTracker,
    work_group_size: UVec3,
    presence_threshold: f32,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuBackend {
    /// Creates a backend with the default work-group size and threshold 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            allocations: AllocationTracker::new(),
            work_group_size: DEFAULT_WORK_GROUP_SIZE,
            presence_threshold: 0.0,
        }
    }

    /// Uses a different work-group size when emulating dispatches.
    #[must_use]
    pub fn with_work_group_size(mut self, size: UVec3) -> Self {
        self.work_group_size = size;
        self
    }

    /// Alpha above which a capture pixel counts as geometry.
    #[must_use]
    pub fn with_presence_threshold(mut self, threshold: f32) -> Self {
        self.presence_threshold = threshold;
        self
    }

    pub fn presence_threshold(&self) -> f32 {
        self.presence_threshold
    }
}

impl SweepBackend for CpuBackend {
    type CaptureTarget = CpuCaptureBuffer;
    type Volume = CpuVolume;

    fn allocate_volume(&mut self, descriptor: &VolumeDescriptor) -> Result<CpuVolume> {
        Ok(CpuVolume {
            resolution: descriptor.resolution(),
            // Stand-in for uninitialized device memory; the clear pass resets it.
            voxels: vec![[0.5; 4]; descriptor.voxel_count()],
            _guard: self.allocations.acquire("volume buffer"),
        })
    }

    fn allocate_capture(&mut self, size: UVec2) -> Result<CpuCaptureBuffer> {
        Ok(CpuCaptureBuffer {
            size,
            pixels: vec![BACKGROUND; (size.x * size.y) as usize],
            _guard: self.allocations.acquire("capture buffer"),
        })
    }

    fn dispatch_kernel(
        &mut self,
        volume: &mut CpuVolume,
        pass: KernelPass<'_, CpuCaptureBuffer>,
        groups: UVec3,
    ) -> Result<()> {
        let (uniforms, capture) = match pass {
            KernelPass::Clear => (KernelUniforms::clear(volume.resolution), None),
            KernelPass::Accumulate {
                capture,
                axis,
                slice,
            } => (
                KernelUniforms::accumulate(
                    volume.resolution,
                    axis,
                    slice,
                    self.presence_threshold,
                ),
                Some(capture),
            ),
        };

        for id in invocations(groups, self.work_group_size) {
            match uniforms.invocation(id) {
                Invocation::OutOfRange | Invocation::Untouched => {}
                Invocation::Clear => {
                    let index = volume.index(id);
                    volume.voxels[index] = BACKGROUND;
                }
                Invocation::Sample(pixel) => {
                    let Some(capture) = capture else { continue };
                    let index = volume.index(id);
                    volume.voxels[index] = combine(
                        volume.voxels[index],
                        capture.pixel(pixel),
                        self.presence_threshold,
                    );
                }
            }
        }
        Ok(())
    }

    fn work_group_size(&self) -> UVec3 {
        self.work_group_size
    }

    fn allocations(&self) -> &AllocationTracker {
        &self.allocations
    }
}

/// A solid axis-aligned box with a flat color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolidBox {
    pub min: Vec3,
    pub max: Vec3,
    pub color: Vec4,
}

impl SolidBox {
    /// Box centered at `center` with half size `half_extent`.
    #[must_use]
    pub fn centered(center: Vec3, half_extent: Vec3, color: Vec4) -> Self {
        Self {
            min: center - half_extent,
            max: center + half_extent,
            color,
        }
    }

    /// Whether the segment from `a` to `b` passes through the box interior.
    fn overlaps_segment(&self, a: Vec3, b: Vec3) -> bool {
        let lo = a.min(b);
        let hi = a.max(b);
        lo.cmplt(self.max).all() && hi.cmpgt(self.min).all()
    }
}

/// Analytic scene of solid boxes.
///
/// A pixel is covered when the segment through the view volume behind it
/// crosses a box; the first box listed wins.
#[derive(Debug, Clone, Default)]
pub struct AabbScene {
    boxes: Vec<SolidBox>,
}

impl AabbScene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a box to the scene.
    pub fn add_box(&mut self, solid: SolidBox) -> &mut Self {
        self.boxes.push(solid);
        self
    }

    pub fn boxes(&self) -> &[SolidBox] {
        &self.boxes
    }

    /// Renders the scene from `pose` into `target`.
    pub fn render(&self, pose: &CapturePose, target: &mut CpuCaptureBuffer) {
        let size = target.size();
        for y in 0..size.y {
            for x in 0..size.x {
                let pixel = UVec2::new(x, y);
                let a = pose.pixel_origin(pixel, size) + pose.forward * pose.near;
                let b = a + pose.forward * (pose.far - pose.near);
                let color = self
                    .boxes
                    .iter()
                    .find(|solid| solid.overlaps_segment(a, b))
                    .map_or(BACKGROUND, |solid| solid.color.to_array());
                target.set_pixel(pixel, color);
            }
        }
    }
}

impl SceneCapture<CpuBackend> for AabbScene {
    fn capture(
        &mut self,
        _backend: &mut CpuBackend,
        pose: &CapturePose,
        target: &mut CpuCaptureBuffer,
    ) -> std::result::Result<(), CaptureError> {
        self.render(pose, target);
        Ok(())
    }
}
