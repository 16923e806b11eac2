//! Orthographic capture rig geometry.
//!
//! The rig looks down one axis at a time. Its view volume is exactly one
//! voxel thick (near = 0, far = voxel density) and covers the whole grid in
//! the two in-plane directions, so every capture pixel corresponds to one
//! voxel of the active plane. Surfaces lying on a slab boundary belong to
//! the voxel on their inner side (see [`CapturePose::owns_surface`]).

use glam::{Mat4, UVec2, Vec2, Vec3};

use crate::axis::Axis;
use crate::descriptor::VolumeDescriptor;

/// Position, orientation and orthographic size of a single capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapturePose {
    /// Camera position in world space.
    pub position: Vec3,
    /// Viewing direction (unit length).
    pub forward: Vec3,
    /// Up vector (unit length, perpendicular to `forward`).
    pub up: Vec3,
    /// Half width and half height of the orthographic view volume.
    pub half_size: Vec2,
    /// Near clipping plane.
    pub near: f32,
    /// Far clipping plane.
    pub far: f32,
}

impl CapturePose {
    /// Returns the view matrix.
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward, self.up)
    }

    /// Returns the orthographic projection matrix (depth mapped to `[0, 1]`).
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::orthographic_rh(
            -self.half_size.x,
            self.half_size.x,
            -self.half_size.y,
            self.half_size.y,
            self.near,
            self.far,
        )
    }

    /// Returns the combined view-projection matrix.
    #[must_use]
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Returns the camera's right direction.
    #[must_use]
    pub fn right(&self) -> Vec3 {
        self.forward.cross(self.up).normalize()
    }

    /// World-space width and height of the view.
    #[must_use]
    pub fn view_size(&self) -> Vec2 {
        self.half_size * 2.0
    }

    /// Projects a world-space point into a target of `size` pixels.
    ///
    /// Returns continuous pixel coordinates (top-left origin) when the point
    /// lies inside the view volume.
    #[must_use]
    pub fn project_to_pixel(&self, point: Vec3, size: UVec2) -> Option<Vec2> {
        let ndc = self.view_projection_matrix().project_point3(point);
        if ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 || !(0.0..=1.0).contains(&ndc.z) {
            return None;
        }
        let size = size.as_vec2();
        Some(Vec2::new(
            (ndc.x + 1.0) * 0.5 * size.x,
            (1.0 - ndc.y) * 0.5 * size.y,
        ))
    }

    /// World-space point at the near plane behind a pixel center.
    #[must_use]
    pub fn pixel_origin(&self, pixel: UVec2, size: UVec2) -> Vec3 {
        let ndc = (pixel.as_vec2() + Vec2::splat(0.5)) / size.as_vec2() * 2.0 - Vec2::ONE;
        self.position
            + self.right() * (ndc.x * self.half_size.x)
            + self.up * (-ndc.y * self.half_size.y)
    }

    /// Distance of `point` in front of the rig along the viewing direction.
    #[must_use]
    pub fn depth_of(&self, point: Vec3) -> f32 {
        (point - self.position).dot(self.forward)
    }

    /// Tolerance band around the near and far planes.
    #[must_use]
    pub fn boundary_margin(&self) -> f32 {
        (self.far - self.near) * SLAB_BOUNDARY_TOLERANCE
    }

    /// Whether a surface at `depth` with outward `normal` belongs to this slab.
    ///
    /// A surface lying on a slab boundary belongs to the voxel on its inner
    /// side: on the near plane only surfaces facing the rig count, on the far
    /// plane only surfaces facing away. Both sweep directions therefore put
    /// a voxel-aligned face into the same voxel.
    #[must_use]
    pub fn owns_surface(&self, depth: f32, normal: Vec3) -> bool {
        let margin = self.boundary_margin();
        let faces_rig = normal.dot(self.forward) < 0.0;
        if depth < self.near - margin || depth > self.far + margin {
            false
        } else if depth <= self.near + margin {
            faces_rig
        } else if depth >= self.far - margin {
            !faces_rig
        } else {
            true
        }
    }

    /// View-projection with the depth range widened by the boundary margin,
    /// so surfaces on either slab boundary survive clipping.
    #[must_use]
    pub fn boundary_view_projection_matrix(&self) -> Mat4 {
        let margin = self.boundary_margin();
        Mat4::orthographic_rh(
            -self.half_size.x,
            self.half_size.x,
            -self.half_size.y,
            self.half_size.y,
            self.near - margin,
            self.far + margin,
        ) * self.view_matrix()
    }
}

/// Boundary tolerance of a slab, relative to its depth.
pub const SLAB_BOUNDARY_TOLERANCE: f32 = 1.0e-3;

/// Capture rig oriented down one sweep axis of a volume.
#[derive(Debug, Clone, Copy)]
pub struct CaptureRig {
    descriptor: VolumeDescriptor,
    axis: Axis,
}

impl CaptureRig {
    /// Orients a rig to look down `axis`.
    #[must_use]
    pub fn new(descriptor: VolumeDescriptor, axis: Axis) -> Self {
        Self { descriptor, axis }
    }

    /// The axis this rig looks down.
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Size of the capture target: the two in-plane resolution components.
    pub fn capture_size(&self) -> UVec2 {
        self.axis.swizzle().capture_size(self.descriptor.resolution())
    }

    /// Number of slices along the sweep axis.
    pub fn slice_count(&self) -> u32 {
        self.descriptor.resolution()[self.axis.component()]
    }

    /// Pose for slice `slice` of this axis.
    ///
    /// The rig sits on the near face of the sampled plane; for negative
    /// passes that face is the plane's upper boundary.
    pub fn pose(&self, slice: u32) -> CapturePose {
        let component = self.axis.component();
        let density = self.descriptor.voxel_density();
        let plane = self.axis.plane_index(slice, self.slice_count());

        let mut position = self.descriptor.grid_center();
        let offset = if self.axis.is_negative() {
            plane + 1
        } else {
            plane
        };
        position[component] = self.descriptor.min_corner()[component] + density * offset as f32;

        let swizzle = self.axis.swizzle();
        let covered = self.descriptor.aligned_extent();
        CapturePose {
            position,
            forward: self.axis.to_vec3(),
            up: self.axis.up(),
            half_size: Vec2::new(covered[swizzle.u], covered[swizzle.v]) * 0.5,
            near: 0.0,
            far: density,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::UVec3;

    fn descriptor() -> VolumeDescriptor {
        VolumeDescriptor::new(Vec3::new(4.0, 3.0, 5.0), 1.0)
            .unwrap()
            .with_center(Vec3::new(0.5, -1.0, 2.0))
    }

    #[test]
    fn test_capture_size_uses_in_plane_components() {
        let d = descriptor();
        assert_eq!(CaptureRig::new(d, Axis::PosX).capture_size(), UVec2::new(5, 3));
        assert_eq!(CaptureRig::new(d, Axis::NegY).capture_size(), UVec2::new(4, 5));
        assert_eq!(CaptureRig::new(d, Axis::PosZ).capture_size(), UVec2::new(4, 3));
        assert_eq!(CaptureRig::new(d, Axis::PosZ).slice_count(), 5);
    }

    #[test]
    fn test_pose_planes() {
        let d = descriptor();
        let pose = CaptureRig::new(d, Axis::PosX).pose(0);
        assert_eq!(pose.position.x, d.min_corner().x);
        assert_eq!(pose.near, 0.0);
        assert_eq!(pose.far, 1.0);
        assert_eq!(pose.view_size(), Vec2::new(5.0, 3.0));

        let pose = CaptureRig::new(d, Axis::NegX).pose(0);
        assert_eq!(pose.position.x, d.min_corner().x + 4.0);
        assert_eq!(pose.forward, Vec3::NEG_X);
    }

    /// Every voxel center of the sampled plane must project into the pixel
    /// the swizzle reads for it, and inside the depth range.
    #[test]
    fn test_rig_matches_swizzle() {
        let d = descriptor();
        let resolution = d.resolution();
        for axis in Axis::SWEEP_ORDER {
            let rig = CaptureRig::new(d, axis);
            let swizzle = axis.swizzle();
            let size = rig.capture_size();
            for slice in 0..rig.slice_count() {
                let pose = rig.pose(slice);
                let plane = axis.plane_index(slice, rig.slice_count());
                for y in 0..size.y {
                    for x in 0..size.x {
                        let pixel = UVec2::new(x, y);
                        let voxel = swizzle.pixel_to_voxel(pixel, plane, resolution);
                        let projected = pose
                            .project_to_pixel(d.voxel_center(voxel), size)
                            .unwrap_or_else(|| panic!("{axis} voxel {voxel} outside view"));
                        assert_eq!(projected.floor().as_uvec2(), pixel, "{axis} voxel {voxel}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_neighbouring_planes_are_clipped() {
        let d = descriptor();
        let rig = CaptureRig::new(d, Axis::PosY);
        let pose = rig.pose(1);
        let size = rig.capture_size();
        assert!(pose.project_to_pixel(d.voxel_center(UVec3::new(0, 1, 0)), size).is_some());
        assert!(pose.project_to_pixel(d.voxel_center(UVec3::new(0, 0, 0)), size).is_none());
        assert!(pose.project_to_pixel(d.voxel_center(UVec3::new(0, 2, 0)), size).is_none());
    }

    /// A cube with faces on voxel boundaries: every pass must attribute
    /// each face to the voxel inside the cube.
    #[test]
    fn test_aligned_faces_belong_to_inner_voxel() {
        let d = VolumeDescriptor::new(Vec3::splat(10.0), 1.0).unwrap();
        // Faces at -2 and +2 bound voxels 3..=6.
        for axis in Axis::SWEEP_ORDER {
            let component = axis.component();
            let rig = CaptureRig::new(d, axis);
            for (face, inner) in [(-2.0_f32, 3_u32), (2.0, 6)] {
                let mut point = Vec3::ZERO;
                point[component] = face;
                let mut normal = Vec3::ZERO;
                normal[component] = face.signum();

                let owners: Vec<u32> = (0..rig.slice_count())
                    .filter(|&slice| {
                        let pose = rig.pose(slice);
                        pose.owns_surface(pose.depth_of(point), normal)
                    })
                    .map(|slice| axis.plane_index(slice, rig.slice_count()))
                    .collect();
                assert_eq!(owners, vec![inner], "{axis} face at {face}");
            }
        }
    }

    #[test]
    fn test_interior_surfaces_belong_regardless_of_facing() {
        let d = descriptor();
        let pose = CaptureRig::new(d, Axis::NegY).pose(1);
        let mid = pose.position + pose.forward * 0.5;
        assert!(pose.owns_surface(pose.depth_of(mid), Vec3::Y));
        assert!(pose.owns_surface(pose.depth_of(mid), Vec3::NEG_Y));
        assert!(!pose.owns_surface(1.5, Vec3::Y));
        assert!(!pose.owns_surface(-0.5, Vec3::Y));
    }

    #[test]
    fn test_boundary_projection_keeps_both_planes() {
        let d = descriptor();
        let pose = CaptureRig::new(d, Axis::PosZ).pose(2);
        let vp = pose.boundary_view_projection_matrix();
        for depth in [0.0, pose.far] {
            let z = vp.project_point3(pose.position + pose.forward * depth).z;
            assert!(z > 0.0 && z < 1.0, "depth {depth} maps to {z}");
        }
    }

    #[test]
    fn test_pixel_origin_lies_on_near_plane() {
        let d = descriptor();
        let rig = CaptureRig::new(d, Axis::NegZ);
        let pose = rig.pose(2);
        let size = rig.capture_size();
        let origin = pose.pixel_origin(UVec2::new(1, 1), size);
        assert!((origin - pose.position).dot(pose.forward).abs() < 1e-5);
        let hit = origin + pose.forward * 0.5;
        let voxel = d.world_to_voxel(hit).unwrap();
        assert_eq!(
            d.resolution()[2] - 1 - 2,
            voxel.z,
            "negative pass slice 2 samples the third plane from the top"
        );
        assert_eq!(Axis::NegZ.swizzle().voxel_to_pixel(voxel, d.resolution()), UVec2::new(1, 1));
    }
}
