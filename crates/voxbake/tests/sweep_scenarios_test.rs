//! End-to-end sweep scenarios on the CPU reference backend.
//!
//! These run without a GPU adapter and pin down the observable behavior the
//! GPU backend must share: resolution rules, presence of solid geometry and
//! resource release on failure.

use proptest::prelude::*;
use voxbake::*;

fn cube_scene(center: Vec3, half_extent: f32, color: Vec4) -> AabbScene {
    let mut scene = AabbScene::new();
    scene.add_box(SolidBox::centered(center, Vec3::splat(half_extent), color));
    scene
}

#[test]
fn centered_cube_fills_a_contiguous_block() {
    let config = VoxelizerConfig {
        extent: Vec3::splat(10.0),
        voxel_density: 1.0,
        ..Default::default()
    };
    let mut scene = cube_scene(Vec3::ZERO, 2.0, Vec4::new(0.2, 0.4, 0.6, 1.0));
    let (volume, stats) = voxelize_reference(&config, &mut scene).unwrap();

    assert_eq!(volume.size(), UVec3::splat(10));
    assert_eq!(stats.captures, 60);
    assert_eq!(stats.dispatches, 61);

    // The cube spans [-2, 2] on every axis: voxels 3..=6.
    let (lo, hi) = volume.presence_bounds(0.0).unwrap();
    assert_eq!(lo, UVec3::splat(3));
    assert_eq!(hi, UVec3::splat(6));
    assert_eq!(volume.occupancy(0.0), 4 * 4 * 4);

    for z in 0..10 {
        for y in 0..10 {
            for x in 0..10 {
                let voxel = UVec3::new(x, y, z);
                let inside = voxel.cmpge(lo).all() && voxel.cmple(hi).all();
                assert_eq!(volume.is_present(voxel, 0.0), inside, "voxel {voxel}");
            }
        }
    }

    let rgba = volume.rgba(5, 5, 5).unwrap();
    assert!((rgba[0] - 0.2).abs() < 1.0 / 255.0);
    assert!((rgba[2] - 0.6).abs() < 1.0 / 255.0);
    assert_eq!(volume.rgba(0, 0, 0), Some([0.0; 4]));
}

#[test]
fn tiny_extent_clamps_resolution_to_one() {
    let config = VoxelizerConfig {
        extent: Vec3::ONE,
        voxel_density: 2.0,
        ..Default::default()
    };
    assert_eq!(config.descriptor().unwrap().resolution(), UVec3::ONE);

    let mut scene = cube_scene(Vec3::ZERO, 0.25, Vec4::ONE);
    let (volume, stats) = voxelize_reference(&config, &mut scene).unwrap();
    assert_eq!(volume.size(), UVec3::ONE);
    assert_eq!(stats.captures, 6);
    assert!(volume.is_present(UVec3::ZERO, 0.0));
}

#[test]
fn single_voxel_volume_round_trips_through_files() {
    let config = VoxelizerConfig {
        extent: Vec3::ONE,
        voxel_density: 2.0,
        ..Default::default()
    };
    let mut scene = cube_scene(Vec3::ZERO, 0.25, Vec4::ONE);
    let (volume, _) = voxelize_reference(&config, &mut scene).unwrap();
    assert!(volume.is_3d());

    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStore::new(dir.path());
    store.store(volume.clone(), "clamped").unwrap();
    assert!(dir.path().join("clamped.raw").exists());
    assert_eq!(store.load_volume("clamped").unwrap(), volume);
}

#[test]
fn capture_failure_aborts_and_releases_everything() {
    let descriptor = VolumeDescriptor::new(Vec3::splat(6.0), 1.0).unwrap();
    let boxes = cube_scene(Vec3::ZERO, 1.0, Vec4::ONE);
    let mut backend = CpuBackend::new();
    let tracker = backend.allocations().clone();

    let mut axes_seen = Vec::new();
    let mut pos_y_captures = 0;
    let mut scene = |_: &mut CpuBackend, pose: &CapturePose, target: &mut CpuCaptureBuffer| {
        if pose.forward == Axis::PosY.to_vec3() {
            if pos_y_captures == 3 {
                return Err(CaptureError::new("scene unavailable"));
            }
            pos_y_captures += 1;
        }
        if axes_seen.last() != Some(&pose.forward) {
            axes_seen.push(pose.forward);
        }
        boxes.render(pose, target);
        Ok(())
    };

    let err = build_volume(&descriptor, &mut backend, &mut scene).unwrap_err();
    match err {
        VoxelError::CaptureFailure { axis, slice, .. } => {
            assert_eq!(axis, Axis::PosY);
            assert_eq!(slice, 3);
        }
        other => panic!("expected a capture failure, got {other}"),
    }

    // -Y was never started.
    assert_eq!(
        axes_seen,
        vec![Axis::PosX.to_vec3(), Axis::NegX.to_vec3(), Axis::PosY.to_vec3()]
    );
    assert_eq!(tracker.outstanding(), 0);
    // One volume plus one capture buffer per started axis.
    assert_eq!(tracker.total_allocated(), 4);
}

#[test]
fn successful_sweep_keeps_only_the_volume() {
    let descriptor = VolumeDescriptor::new(Vec3::new(3.0, 4.0, 5.0), 1.0).unwrap();
    let mut backend = CpuBackend::new();
    let mut scene = cube_scene(Vec3::ZERO, 1.0, Vec4::ONE);

    let output = build_volume(&descriptor, &mut backend, &mut scene).unwrap();
    assert_eq!(backend.allocations().outstanding(), 1);
    drop(output);
    assert_eq!(backend.allocations().outstanding(), 0);
}

#[test]
fn sweep_order_does_not_change_single_color_scenes() {
    let base = VoxelizerConfig {
        extent: Vec3::new(6.0, 4.0, 5.0),
        voxel_density: 0.5,
        ..Default::default()
    };
    let mut reversed = base.clone();
    reversed.axes.reverse();

    let mut scene = AabbScene::new();
    scene
        .add_box(SolidBox::centered(Vec3::new(-1.0, 0.0, 0.0), Vec3::splat(0.75), Vec4::ONE))
        .add_box(SolidBox::centered(Vec3::new(1.5, 1.0, 0.5), Vec3::new(0.5, 0.25, 1.0), Vec4::ONE));

    let (forward, _) = voxelize_reference(&base, &mut scene).unwrap();
    let (backward, _) = voxelize_reference(&reversed, &mut scene).unwrap();
    assert_eq!(forward, backward);
    assert!(forward.occupancy(0.0) > 0);
}

#[test]
fn single_axis_sweep_still_sees_geometry() {
    let config = VoxelizerConfig {
        extent: Vec3::splat(4.0),
        axes: vec![Axis::NegZ],
        ..Default::default()
    };
    let mut scene = cube_scene(Vec3::ZERO, 1.0, Vec4::ONE);
    let (volume, stats) = voxelize_reference(&config, &mut scene).unwrap();
    assert_eq!(stats.axes, 1);
    assert_eq!(stats.captures, 4);
    assert_eq!(volume.occupancy(0.0), 8);
}

#[test]
fn baked_volume_reaches_the_store() {
    let config = VoxelizerConfig {
        extent: Vec3::splat(4.0),
        ..Default::default()
    };
    let mut scene = cube_scene(Vec3::ZERO, 1.0, Vec4::ONE);
    let (volume, _) = voxelize_reference(&config, &mut scene).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStore::new(dir.path());
    store.store(volume.clone(), "bakes/cube").unwrap();
    assert_eq!(store.load_volume("bakes/cube").unwrap(), volume);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_axis_order_gives_the_same_volume(
        order in Just(Axis::SWEEP_ORDER.to_vec()).prop_shuffle(),
        center in prop::array::uniform3(-1.5f32..1.5),
        half in prop::array::uniform3(0.1f32..1.5),
    ) {
        let base = VoxelizerConfig {
            extent: Vec3::new(4.0, 3.0, 5.0),
            voxel_density: 0.5,
            ..Default::default()
        };
        let shuffled = VoxelizerConfig {
            axes: order,
            ..base.clone()
        };
        let mut scene = AabbScene::new();
        scene.add_box(SolidBox::centered(
            Vec3::from_array(center),
            Vec3::from_array(half),
            Vec4::new(0.8, 0.3, 0.1, 1.0),
        ));

        let (expected, _) = voxelize_reference(&base, &mut scene).unwrap();
        let (actual, _) = voxelize_reference(&shuffled, &mut scene).unwrap();
        prop_assert_eq!(actual, expected);
    }
}
