//! Contract of the accumulation kernel.
//!
//! The GPU kernel (`accumulate.wgsl` in the render crate) and the CPU
//! reference backend share the uniform layout and the per-invocation rules
//! defined here.

use glam::{UVec2, UVec3};

use crate::axis::Axis;

/// Kernel mode: write background everywhere.
pub const MODE_CLEAR: u32 = 0;
/// Kernel mode: accumulate one capture into one plane.
pub const MODE_ACCUMULATE: u32 = 1;

/// Background value written by the clear pass (zero alpha).
pub const BACKGROUND: [f32; 4] = [0.0; 4];

/// One kernel dispatch: either the initial clear or one axis/slice pass.
#[derive(Debug)]
pub enum KernelPass<'a, C> {
    /// Unconditionally write [`BACKGROUND`] to every voxel.
    Clear,
    /// Combine `capture` into the plane that `slice` of `axis` samples.
    Accumulate {
        capture: &'a C,
        axis: Axis,
        slice: u32,
    },
}

/// GPU representation of the kernel parameters.
///
/// Field order matches the WGSL struct; `resolution` occupies a `vec3<u32>`
/// slot and `mode` fills its padding.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct KernelUniforms {
    pub resolution: [u32; 3],
    pub mode: u32,
    pub sweep_component: u32,
    pub u_component: u32,
    pub v_component: u32,
    pub plane: u32,
    pub flip_u: u32,
    pub flip_v: u32,
    pub presence_threshold: f32,
    pub _padding: u32,
}

impl KernelUniforms {
    /// Parameters of the clear pass.
    #[must_use]
    pub fn clear(resolution: UVec3) -> Self {
        Self {
            resolution: resolution.to_array(),
            mode: MODE_CLEAR,
            ..Self::zeroed_default()
        }
    }

    /// Parameters of slice `slice` of `axis`.
    #[must_use]
    pub fn accumulate(resolution: UVec3, axis: Axis, slice: u32, presence_threshold: f32) -> Self {
        let swizzle = axis.swizzle();
        Self {
            resolution: resolution.to_array(),
            mode: MODE_ACCUMULATE,
            sweep_component: swizzle.sweep as u32,
            u_component: swizzle.u as u32,
            v_component: swizzle.v as u32,
            plane: axis.plane_index(slice, resolution[swizzle.sweep]),
            flip_u: u32::from(swizzle.flip_u),
            flip_v: u32::from(swizzle.flip_v),
            presence_threshold,
            _padding: 0,
        }
    }

    fn zeroed_default() -> Self {
        bytemuck::Zeroable::zeroed()
    }

    /// Decides what the invocation with global id `id` does.
    #[must_use]
    pub fn invocation(&self, id: UVec3) -> Invocation {
        let resolution = UVec3::from_array(self.resolution);
        if id.cmpge(resolution).any() {
            return Invocation::OutOfRange;
        }
        if self.mode == MODE_CLEAR {
            return Invocation::Clear;
        }
        if id[self.sweep_component as usize] != self.plane {
            return Invocation::Untouched;
        }

        let u = self.u_component as usize;
        let v = self.v_component as usize;
        let mut pixel = UVec2::new(id[u], id[v]);
        if self.flip_u != 0 {
            pixel.x = resolution[u] - 1 - pixel.x;
        }
        if self.flip_v != 0 {
            pixel.y = resolution[v] - 1 - pixel.y;
        }
        Invocation::Sample(pixel)
    }
}

/// Outcome of one kernel invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// Padding invocation past the grid edge; no-op.
    OutOfRange,
    /// Off the active plane; leave the voxel as is.
    Untouched,
    /// Clear pass; write background.
    Clear,
    /// Read this capture pixel and combine it into the voxel.
    Sample(UVec2),
}

/// Monotonic presence combine.
///
/// Voxels already holding geometry keep their value (first writer wins);
/// otherwise a sample with coverage replaces the voxel. Background samples
/// never erase anything.
#[must_use]
pub fn combine(existing: [f32; 4], sample: [f32; 4], presence_threshold: f32) -> [f32; 4] {
    if existing[3] > presence_threshold {
        existing
    } else if sample[3] > presence_threshold {
        sample
    } else {
        existing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_layout_matches_wgsl() {
        assert_eq!(std::mem::size_of::<KernelUniforms>(), 48);
    }

    #[test]
    fn test_clear_ignores_plane() {
        let u = KernelUniforms::clear(UVec3::splat(4));
        assert_eq!(u.invocation(UVec3::new(3, 2, 1)), Invocation::Clear);
        assert_eq!(u.invocation(UVec3::new(4, 0, 0)), Invocation::OutOfRange);
    }

    #[test]
    fn test_accumulate_samples_only_active_plane() {
        let resolution = UVec3::new(4, 5, 6);
        let u = KernelUniforms::accumulate(resolution, Axis::NegX, 0, 0.0);
        assert_eq!(u.plane, 3);
        assert_eq!(u.invocation(UVec3::new(0, 0, 0)), Invocation::Untouched);
        assert_eq!(
            u.invocation(UVec3::new(3, 1, 2)),
            Invocation::Sample(Axis::NegX.swizzle().voxel_to_pixel(UVec3::new(3, 1, 2), resolution))
        );
        assert_eq!(u.invocation(UVec3::new(3, 5, 0)), Invocation::OutOfRange);
    }

    #[test]
    fn test_invocation_agrees_with_swizzle() {
        let resolution = UVec3::new(3, 4, 5);
        for axis in Axis::SWEEP_ORDER {
            let slices = resolution[axis.component()];
            for slice in 0..slices {
                let u = KernelUniforms::accumulate(resolution, axis, slice, 0.0);
                let plane = axis.plane_index(slice, slices);
                let mut voxel = UVec3::ONE;
                voxel[axis.component()] = plane;
                assert_eq!(
                    u.invocation(voxel),
                    Invocation::Sample(axis.swizzle().voxel_to_pixel(voxel, resolution))
                );
            }
        }
    }

    #[test]
    fn test_combine_is_monotonic() {
        let red = [1.0, 0.0, 0.0, 1.0];
        let blue = [0.0, 0.0, 1.0, 1.0];
        assert_eq!(combine(BACKGROUND, red, 0.0), red);
        assert_eq!(combine(red, BACKGROUND, 0.0), red);
        assert_eq!(combine(red, blue, 0.0), red);
        assert_eq!(combine(BACKGROUND, BACKGROUND, 0.0), BACKGROUND);
        assert_eq!(combine(BACKGROUND, [1.0, 1.0, 1.0, 0.25], 0.5), BACKGROUND);
    }
}
