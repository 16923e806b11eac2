//! Volume descriptor: grid extents, voxel density and derived resolution.

use glam::{UVec3, Vec3};

use crate::error::ConfigError;

/// Largest resolution allowed along any axis.
///
/// Matches the default 3D texture dimension limit of wgpu devices.
pub const MAX_RESOLUTION: u32 = 2048;

/// Immutable description of the volume a sweep produces.
///
/// The grid is anchored at `center - extent / 2`; voxel `i` along an axis
/// spans `[min + i * density, min + (i + 1) * density]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeDescriptor {
    extent: Vec3,
    voxel_density: f32,
    center: Vec3,
    resolution: UVec3,
}

impl VolumeDescriptor {
    /// Creates a descriptor centered at the origin.
    ///
    /// Resolution is `floor(extent / voxel_density)` per component, clamped
    /// to at least 1.
    pub fn new(extent: Vec3, voxel_density: f32) -> Result<Self, ConfigError> {
        if !(voxel_density.is_finite() && voxel_density > 0.0) {
            return Err(ConfigError::NonPositiveDensity(voxel_density));
        }
        if !(extent.is_finite() && extent.cmpgt(Vec3::ZERO).all()) {
            return Err(ConfigError::NonPositiveExtent(extent.to_array()));
        }

        let resolution = Self::resolution_for(extent, voxel_density)?;
        let descriptor = Self {
            extent,
            voxel_density,
            center: Vec3::ZERO,
            resolution,
        };
        if !descriptor.is_aligned() {
            log::warn!(
                "extent {extent} is not a multiple of voxel density {voxel_density}; \
                 the grid covers {}",
                descriptor.aligned_extent()
            );
        }
        Ok(descriptor)
    }

    /// Creates a descriptor from an explicit resolution.
    pub fn from_resolution(resolution: UVec3, voxel_density: f32) -> Result<Self, ConfigError> {
        if resolution.cmpeq(UVec3::ZERO).any() {
            return Err(ConfigError::ZeroResolution(resolution.to_array()));
        }
        if let Some(&too_large) = resolution.to_array().iter().find(|&&r| r > MAX_RESOLUTION) {
            return Err(ConfigError::ResolutionTooLarge {
                resolution: too_large as f32,
                limit: MAX_RESOLUTION,
            });
        }
        let extent = resolution.as_vec3() * voxel_density;
        let mut descriptor = Self::new(extent, voxel_density)?;
        descriptor.resolution = resolution;
        Ok(descriptor)
    }

    /// Places the volume around `center`.
    #[must_use]
    pub fn with_center(mut self, center: Vec3) -> Self {
        self.center = center;
        self
    }

    /// Computes `floor(extent / voxel_density)` componentwise, never below 1.
    pub fn resolution_for(extent: Vec3, voxel_density: f32) -> Result<UVec3, ConfigError> {
        let cells = (extent / voxel_density).floor().max(Vec3::ONE);
        let largest = cells.max_element();
        if largest > MAX_RESOLUTION as f32 {
            return Err(ConfigError::ResolutionTooLarge {
                resolution: largest,
                limit: MAX_RESOLUTION,
            });
        }
        Ok(cells.as_uvec3())
    }

    /// World-space size requested for the volume.
    pub fn extent(&self) -> Vec3 {
        self.extent
    }

    /// World units per voxel edge.
    pub fn voxel_density(&self) -> f32 {
        self.voxel_density
    }

    /// Center of the requested extent.
    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// Number of voxels along each axis.
    pub fn resolution(&self) -> UVec3 {
        self.resolution
    }

    /// Total number of voxels.
    pub fn voxel_count(&self) -> usize {
        self.resolution.x as usize * self.resolution.y as usize * self.resolution.z as usize
    }

    /// World-space minimum corner of the grid.
    pub fn min_corner(&self) -> Vec3 {
        self.center - self.extent * 0.5
    }

    /// World-space size actually covered by whole voxels.
    pub fn aligned_extent(&self) -> Vec3 {
        self.resolution.as_vec3() * self.voxel_density
    }

    /// World-space center of the covered grid.
    pub fn grid_center(&self) -> Vec3 {
        self.min_corner() + self.aligned_extent() * 0.5
    }

    /// Whether the extent is an exact multiple of the density.
    pub fn is_aligned(&self) -> bool {
        let diff = (self.aligned_extent() - self.extent).abs();
        diff.max_element() <= self.voxel_density * 1e-4
    }

    /// World-space center of a voxel.
    pub fn voxel_center(&self, voxel: UVec3) -> Vec3 {
        self.min_corner() + (voxel.as_vec3() + Vec3::splat(0.5)) * self.voxel_density
    }

    /// Voxel containing a world-space point, if it lies inside the grid.
    pub fn world_to_voxel(&self, point: Vec3) -> Option<UVec3> {
        let cell = ((point - self.min_corner()) / self.voxel_density).floor();
        if cell.cmplt(Vec3::ZERO).any() || cell.cmpge(self.resolution.as_vec3()).any() {
            return None;
        }
        Some(cell.as_uvec3())
    }

    /// Linear storage index of a voxel (x fastest, then y, then z).
    pub fn linear_index(&self, voxel: UVec3) -> usize {
        let r = self.resolution;
        voxel.x as usize + r.x as usize * (voxel.y as usize + r.y as usize * voxel.z as usize)
    }
}
