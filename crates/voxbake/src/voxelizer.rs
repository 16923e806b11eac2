//! Headless voxelization API.
//!
//! [`Voxelizer`] owns a GPU device and runs sweeps, transfers and bakes on
//! it. [`voxelize_reference`] runs the same sweep on the CPU backend, which
//! needs no adapter.

use glam::UVec3;
use pollster::FutureExt;
use voxbake_core::{
    AllocationTracker, CpuBackend, MaterializedImage, Persistence, Result, SceneCapture,
    SweepController, SweepOutput, SweepProgress, SweepStats, VolumeDescriptor, VoxelError,
    VoxelizerConfig,
};
use voxbake_render::{GpuBackend, GpuImage, GpuVolume, Materializer, RenderEngine};

/// Outcome of [`Voxelizer::bake`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BakeReport {
    /// Statistics of the sweep.
    pub stats: SweepStats,
    /// Voxels holding geometry.
    pub occupancy: usize,
    /// Inclusive voxel bounds of the geometry, if any.
    pub bounds: Option<(UVec3, UVec3)>,
}

/// Builds color/presence volumes on a headless GPU device.
pub struct Voxelizer {
    config: VoxelizerConfig,
    descriptor: VolumeDescriptor,
    engine: RenderEngine,
    allocations: AllocationTracker,
}

impl Voxelizer {
    /// Validates `config` and creates a headless device for it.
    pub fn new(config: VoxelizerConfig) -> Result<Self> {
        config.validate()?;
        let engine = RenderEngine::new_headless().block_on()?;
        Self::with_engine(config, engine)
    }

    /// Uses an existing engine.
    pub fn with_engine(config: VoxelizerConfig, engine: RenderEngine) -> Result<Self> {
        config.validate()?;
        let descriptor = config.descriptor()?;
        log::info!(
            "voxelizer ready: {} voxels at density {}",
            descriptor.resolution(),
            descriptor.voxel_density()
        );
        Ok(Self {
            config,
            descriptor,
            engine,
            allocations: AllocationTracker::new(),
        })
    }

    pub fn config(&self) -> &VoxelizerConfig {
        &self.config
    }

    pub fn descriptor(&self) -> &VolumeDescriptor {
        &self.descriptor
    }

    pub fn engine(&self) -> &RenderEngine {
        &self.engine
    }

    /// Tracker shared by every buffer this voxelizer allocates.
    pub fn allocations(&self) -> &AllocationTracker {
        &self.allocations
    }

    /// Creates a GPU backend configured for this voxelizer.
    pub fn backend(&self) -> Result<GpuBackend<'_>> {
        Ok(GpuBackend::new(
            &self.engine,
            self.config.capture_format,
            self.config.work_group_size,
        )?
        .with_presence_threshold(self.config.presence_threshold)
        .with_tracker(self.allocations.clone()))
    }

    /// Sweeps `scene` into a GPU volume.
    pub fn voxelize<'s, S>(&'s self, scene: &mut S) -> Result<SweepOutput<GpuVolume>>
    where
        S: SceneCapture<GpuBackend<'s>> + ?Sized,
    {
        self.voxelize_with_progress(scene, |_| {})
    }

    /// Sweeps `scene`, reporting each accumulated slice to `progress`.
    pub fn voxelize_with_progress<'s, S>(
        &'s self,
        scene: &mut S,
        progress: impl FnMut(SweepProgress),
    ) -> Result<SweepOutput<GpuVolume>>
    where
        S: SceneCapture<GpuBackend<'s>> + ?Sized,
    {
        let mut backend = self.backend()?;
        let mut controller = SweepController::new(self.descriptor)
            .with_order(&self.config.axes)?
            .on_progress(progress);
        controller.build_volume(&mut backend, scene)
    }

    /// Copies a GPU image into host memory, releasing the GPU image.
    pub fn materialize(&self, image: GpuImage) -> Result<MaterializedImage> {
        Ok(Materializer::new(&self.engine)
            .with_tracker(self.allocations.clone())
            .materialize(image)?)
    }

    /// Sweeps `scene`, reads the volume back and hands it to `store`.
    ///
    /// Nothing is stored if any step fails.
    pub fn bake<'s, S, P>(
        &'s self,
        scene: &mut S,
        store: &mut P,
        logical_path: &str,
    ) -> Result<BakeReport>
    where
        S: SceneCapture<GpuBackend<'s>> + ?Sized,
        P: Persistence + ?Sized,
    {
        let SweepOutput { volume, stats } = self.voxelize(scene)?;
        let image = self.materialize(volume.into_image())?;
        persist(image, stats, self.config.presence_threshold, store, logical_path)
    }
}

/// Sweeps `scene` on the CPU reference backend and returns the volume image.
pub fn voxelize_reference<S>(
    config: &VoxelizerConfig,
    scene: &mut S,
) -> Result<(MaterializedImage, SweepStats)>
where
    S: SceneCapture<CpuBackend> + ?Sized,
{
    config.validate()?;
    let mut backend = CpuBackend::new()
        .with_work_group_size(config.work_group_size)
        .with_presence_threshold(config.presence_threshold);
    let mut controller = SweepController::new(config.descriptor()?).with_order(&config.axes)?;
    let SweepOutput { volume, stats } = controller.build_volume(&mut backend, scene)?;
    Ok((volume.to_image()?, stats))
}

fn persist<P>(
    image: MaterializedImage,
    stats: SweepStats,
    presence_threshold: f32,
    store: &mut P,
    logical_path: &str,
) -> Result<BakeReport>
where
    P: Persistence + ?Sized,
{
    let report = BakeReport {
        stats,
        occupancy: image.occupancy(presence_threshold),
        bounds: image.presence_bounds(presence_threshold),
    };
    store
        .store(image, logical_path)
        .map_err(|err| VoxelError::Persistence(err.to_string()))?;
    log::info!(
        "baked {logical_path}: {} occupied voxels in {:?}",
        report.occupancy,
        report.stats.elapsed
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};
    use voxbake_core::{AabbScene, MemoryStore, SolidBox};

    fn small_config() -> VoxelizerConfig {
        VoxelizerConfig {
            extent: Vec3::splat(4.0),
            voxel_density: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_reference_sweep_matches_box() {
        let mut scene = AabbScene::new();
        scene.add_box(SolidBox::centered(Vec3::ZERO, Vec3::splat(1.0), Vec4::ONE));
        let (image, stats) = voxelize_reference(&small_config(), &mut scene).unwrap();

        assert_eq!(image.size(), UVec3::splat(4));
        assert_eq!(stats.axes, 6);
        assert_eq!(image.occupancy(0.0), 8);
        assert_eq!(image.presence_bounds(0.0), Some((UVec3::ONE, UVec3::splat(2))));
    }

    #[test]
    fn test_reference_rejects_invalid_config() {
        let config = VoxelizerConfig {
            voxel_density: 0.0,
            ..Default::default()
        };
        let err = voxelize_reference(&config, &mut AabbScene::new()).unwrap_err();
        assert!(matches!(err, VoxelError::Configuration(_)));
    }

    #[test]
    fn test_persist_reports_occupancy_and_stores() {
        let mut scene = AabbScene::new();
        scene.add_box(SolidBox::centered(Vec3::ZERO, Vec3::splat(1.0), Vec4::ONE));
        let (image, stats) = voxelize_reference(&small_config(), &mut scene).unwrap();

        let mut store = MemoryStore::new();
        let report = persist(image, stats, 0.0, &mut store, "cube").unwrap();
        assert_eq!(report.occupancy, 8);
        assert_eq!(store.get("cube").map(MaterializedImage::size), Some(UVec3::splat(4)));
    }

    #[test]
    fn test_persist_failure_is_reported() {
        struct FullDisk;
        impl Persistence for FullDisk {
            type Error = std::io::Error;
            fn store(&mut self, _: MaterializedImage, _: &str) -> std::io::Result<()> {
                Err(std::io::Error::other("disk full"))
            }
        }

        let (image, stats) = voxelize_reference(&small_config(), &mut AabbScene::new()).unwrap();
        let err = persist(image, stats, 0.0, &mut FullDisk, "cube").unwrap_err();
        match err {
            VoxelError::Persistence(reason) => assert!(reason.contains("disk full")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
