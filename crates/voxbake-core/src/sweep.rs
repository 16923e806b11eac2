//! Six-axis sweep controller.
//!
//! Builds a volume by capturing the scene slice by slice down each axis and
//! accumulating every capture into the volume with the kernel. Axis passes
//! and slice passes run strictly in sequence: each dispatch reads the
//! capture written immediately before it.

use std::time::{Duration, Instant};

use glam::UVec3;

use crate::axis::Axis;
use crate::backend::{SceneCapture, SweepBackend};
use crate::descriptor::VolumeDescriptor;
use crate::dispatch::dispatch_size;
use crate::error::{ConfigError, Result, VoxelError};
use crate::kernel::KernelPass;
use crate::rig::CaptureRig;

/// Progress notification sent after each slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepProgress {
    /// Axis being swept.
    pub axis: Axis,
    /// Position of `axis` in the sweep order.
    pub axis_index: usize,
    /// Number of axes in the sweep.
    pub axis_count: usize,
    /// Slice just accumulated.
    pub slice: u32,
    /// Number of slices on this axis.
    pub slice_count: u32,
}

/// Summary of a finished sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepStats {
    /// Axis passes executed.
    pub axes: usize,
    /// Scene captures rendered.
    pub captures: u32,
    /// Kernel dispatches, including the clear pass.
    pub dispatches: u32,
    /// Work groups per dispatch.
    pub dispatch_groups: UVec3,
    /// Wall-clock time of the sweep.
    pub elapsed: Duration,
}

/// A completed volume and the statistics of the sweep that built it.
#[derive(Debug)]
pub struct SweepOutput<V> {
    pub volume: V,
    pub stats: SweepStats,
}

/// Checks a sweep order: non-empty and no axis listed twice.
pub fn validate_sweep_order(order: &[Axis]) -> std::result::Result<(), ConfigError> {
    if order.is_empty() {
        return Err(ConfigError::EmptySweepOrder);
    }
    for (i, axis) in order.iter().enumerate() {
        if order[..i].contains(axis) {
            return Err(ConfigError::DuplicateAxis(*axis));
        }
    }
    Ok(())
}

/// Drives the capture rig and accumulation kernel across all axes.
pub struct SweepController<'a> {
    descriptor: VolumeDescriptor,
    order: Vec<Axis>,
    progress: Option<Box<dyn FnMut(SweepProgress) + 'a>>,
}

impl<'a> SweepController<'a> {
    /// Creates a controller using the fixed order `+X, -X, +Y, -Y, +Z, -Z`.
    #[must_use]
    pub fn new(descriptor: VolumeDescriptor) -> Self {
        Self {
            descriptor,
            order: Axis::SWEEP_ORDER.to_vec(),
            progress: None,
        }
    }

    /// Replaces the axis processing order.
    pub fn with_order(mut self, order: &[Axis]) -> std::result::Result<Self, ConfigError> {
        validate_sweep_order(order)?;
        self.order = order.to_vec();
        Ok(self)
    }

    /// Registers a callback invoked after each accumulated slice.
    #[must_use]
    pub fn on_progress(mut self, callback: impl FnMut(SweepProgress) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// The descriptor this controller sweeps.
    pub fn descriptor(&self) -> &VolumeDescriptor {
        &self.descriptor
    }

    /// The axis processing order.
    pub fn order(&self) -> &[Axis] {
        &self.order
    }

    /// Builds the volume.
    ///
    /// On failure every buffer allocated so far is released and no volume is
    /// returned.
    pub fn build_volume<B, S>(
        &mut self,
        backend: &mut B,
        scene: &mut S,
    ) -> Result<SweepOutput<B::Volume>>
    where
        B: SweepBackend,
        S: SceneCapture<B> + ?Sized,
    {
        let started = Instant::now();
        let resolution = self.descriptor.resolution();
        let groups = dispatch_size(resolution, backend.work_group_size());
        log::info!(
            "sweeping {} axes over a {}x{}x{} volume ({} work groups per dispatch)",
            self.order.len(),
            resolution.x,
            resolution.y,
            resolution.z,
            groups.x * groups.y * groups.z
        );

        let mut volume = backend.allocate_volume(&self.descriptor)?;
        backend.dispatch_kernel(&mut volume, KernelPass::Clear, groups)?;

        let mut stats = SweepStats {
            axes: 0,
            captures: 0,
            dispatches: 1,
            dispatch_groups: groups,
            elapsed: Duration::ZERO,
        };

        let axis_count = self.order.len();
        for (axis_index, &axis) in self.order.iter().enumerate() {
            let rig = CaptureRig::new(self.descriptor, axis);
            let slice_count = rig.slice_count();
            let capture_size = rig.capture_size();
            log::debug!(
                "axis {axis}: {slice_count} slices, capture buffer {}x{}",
                capture_size.x,
                capture_size.y
            );

            let mut capture = backend.allocate_capture(capture_size)?;
            for slice in 0..slice_count {
                let pose = rig.pose(slice);
                log::trace!("axis {axis} slice {slice}: rig at {}", pose.position);

                scene
                    .capture(backend, &pose, &mut capture)
                    .map_err(|e| {
                        log::error!("capture failed on axis {axis}, slice {slice}: {e}");
                        VoxelError::CaptureFailure {
                            axis,
                            slice,
                            reason: e.to_string(),
                        }
                    })?;
                stats.captures += 1;

                backend.dispatch_kernel(
                    &mut volume,
                    KernelPass::Accumulate {
                        capture: &capture,
                        axis,
                        slice,
                    },
                    groups,
                )?;
                stats.dispatches += 1;

                if let Some(progress) = self.progress.as_mut() {
                    progress(SweepProgress {
                        axis,
                        axis_index,
                        axis_count,
                        slice,
                        slice_count,
                    });
                }
            }
            drop(capture);
            log::debug!("axis {axis}: capture buffer released");
            stats.axes += 1;
        }

        stats.elapsed = started.elapsed();
        log::info!(
            "sweep finished: {} captures, {} dispatches in {:.2?}",
            stats.captures,
            stats.dispatches,
            stats.elapsed
        );
        Ok(SweepOutput { volume, stats })
    }
}

/// Builds a volume with the default axis order.
pub fn build_volume<B, S>(
    descriptor: &VolumeDescriptor,
    backend: &mut B,
    scene: &mut S,
) -> Result<SweepOutput<B::Volume>>
where
    B: SweepBackend,
    S: SceneCapture<B> + ?Sized,
{
    SweepController::new(*descriptor).build_volume(backend, scene)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CaptureError;
    use crate::cpu::{AabbScene, CpuBackend, CpuCaptureBuffer};
    use crate::rig::CapturePose;
    use glam::Vec3;

    fn descriptor() -> VolumeDescriptor {
        VolumeDescriptor::new(Vec3::new(4.0, 3.0, 2.0), 1.0).unwrap()
    }

    #[test]
    fn test_validate_sweep_order() {
        assert!(validate_sweep_order(&Axis::SWEEP_ORDER).is_ok());
        assert_eq!(validate_sweep_order(&[]), Err(ConfigError::EmptySweepOrder));
        assert_eq!(
            validate_sweep_order(&[Axis::PosX, Axis::NegY, Axis::PosX]),
            Err(ConfigError::DuplicateAxis(Axis::PosX))
        );
    }

    #[test]
    fn test_stats_count_every_slice() {
        let mut backend = CpuBackend::new();
        let mut scene = AabbScene::new();
        let output = build_volume(&descriptor(), &mut backend, &mut scene).unwrap();
        // 2 * (4 + 3 + 2) slices.
        assert_eq!(output.stats.captures, 18);
        assert_eq!(output.stats.dispatches, 19);
        assert_eq!(output.stats.axes, 6);
        assert_eq!(output.volume.present_count(0.0), 0);
    }

    #[test]
    fn test_progress_follows_order() {
        let mut seen = Vec::new();
        {
            let mut controller = SweepController::new(descriptor())
                .with_order(&[Axis::NegZ, Axis::PosY])
                .unwrap()
                .on_progress(|p| seen.push((p.axis, p.slice)));
            let mut backend = CpuBackend::new();
            controller
                .build_volume(&mut backend, &mut AabbScene::new())
                .unwrap();
        }
        assert_eq!(
            seen,
            vec![
                (Axis::NegZ, 0),
                (Axis::NegZ, 1),
                (Axis::PosY, 0),
                (Axis::PosY, 1),
                (Axis::PosY, 2)
            ]
        );
    }

    #[test]
    fn test_capture_sizes_change_per_axis() {
        let mut sizes = Vec::new();
        let mut scene = |_: &mut CpuBackend, pose: &CapturePose, target: &mut CpuCaptureBuffer| {
            sizes.push((pose.forward, target.size()));
            Ok::<(), CaptureError>(())
        };
        let mut backend = CpuBackend::new();
        build_volume(&descriptor(), &mut backend, &mut scene).unwrap();
        sizes.dedup();
        assert_eq!(sizes.len(), 6);
        assert_eq!(sizes[0], (Vec3::X, glam::UVec2::new(2, 3)));
        assert_eq!(sizes[2], (Vec3::Y, glam::UVec2::new(4, 2)));
        assert_eq!(sizes[5], (Vec3::NEG_Z, glam::UVec2::new(4, 3)));
    }

    mod properties {
        use super::*;
        use crate::cpu::SolidBox;
        use crate::kernel::KernelPass;
        use glam::{UVec2, Vec4};
        use proptest::prelude::*;

        fn axis_strategy() -> impl Strategy<Value = Axis> {
            (0u32..6).prop_map(|i| Axis::from_index(i).unwrap())
        }

        fn box_strategy() -> impl Strategy<Value = SolidBox> {
            (
                (-3.0f32..3.0, -3.0f32..3.0, -3.0f32..3.0),
                (0.2f32..2.5, 0.2f32..2.5, 0.2f32..2.5),
            )
                .prop_map(|((cx, cy, cz), (hx, hy, hz))| {
                    SolidBox::centered(
                        Vec3::new(cx, cy, cz),
                        Vec3::new(hx, hy, hz),
                        Vec4::new(0.2, 0.6, 1.0, 1.0),
                    )
                })
        }

        proptest! {
            /// Once a voxel holds geometry no later pass can revert it.
            #[test]
            fn prop_presence_is_monotonic(
                passes in prop::collection::vec(
                    (axis_strategy(), 0u32..5, prop::collection::vec(any::<bool>(), 25)),
                    1..20,
                ),
            ) {
                let d = VolumeDescriptor::new(Vec3::splat(5.0), 1.0).unwrap();
                let mut backend = CpuBackend::new();
                let mut volume = backend.allocate_volume(&d).unwrap();
                backend.dispatch_kernel(&mut volume, KernelPass::Clear, UVec3::ONE).unwrap();
                let mut capture = backend.allocate_capture(UVec2::splat(5)).unwrap();

                let mut present = vec![false; d.voxel_count()];
                for (axis, slice, mask) in passes {
                    for (i, covered) in mask.iter().enumerate() {
                        let pixel = UVec2::new(i as u32 % 5, i as u32 / 5);
                        let alpha = if *covered { 1.0 } else { 0.0 };
                        capture.set_pixel(pixel, [1.0, 1.0, 1.0, alpha]);
                    }
                    backend
                        .dispatch_kernel(
                            &mut volume,
                            KernelPass::Accumulate { capture: &capture, axis, slice },
                            UVec3::ONE,
                        )
                        .unwrap();
                    for z in 0..5 {
                        for y in 0..5 {
                            for x in 0..5 {
                                let voxel = UVec3::new(x, y, z);
                                let index = d.linear_index(voxel);
                                let now = volume.is_present(voxel, 0.0);
                                prop_assert!(now || !present[index]);
                                present[index] = now;
                            }
                        }
                    }
                }
            }

            /// Permuting the axis order does not change the result.
            #[test]
            fn prop_sweep_order_independent(
                boxes in prop::collection::vec(box_strategy(), 1..4),
                order in Just(Axis::SWEEP_ORDER.to_vec()).prop_shuffle(),
            ) {
                let d = VolumeDescriptor::new(Vec3::new(8.0, 6.0, 7.0), 1.0).unwrap();
                let mut scene = AabbScene::new();
                for solid in boxes {
                    scene.add_box(solid);
                }

                let mut backend = CpuBackend::new();
                let fixed = build_volume(&d, &mut backend, &mut scene).unwrap().volume;
                let permuted = SweepController::new(d)
                    .with_order(&order)
                    .unwrap()
                    .build_volume(&mut backend, &mut scene)
                    .unwrap()
                    .volume;

                prop_assert_eq!(fixed.to_image().unwrap(), permuted.to_image().unwrap());
            }
        }
    }
}
