//! voxbake: a six-axis slice-sweep voxelizer.
//!
//! The scene is rendered orthographically one voxel-thick slab at a time
//! from each of the six axis directions. A compute kernel folds every slab
//! capture into one plane of a 3D volume; a voxel keeps the first color that
//! covered it. The result is a color/presence volume that can be read back
//! and persisted.
//!
//! # Quick Start
//!
//! ```no_run
//! use voxbake::*;
//!
//! fn main() -> Result<()> {
//!     init_logging();
//!
//!     let config = VoxelizerConfig {
//!         extent: Vec3::splat(4.0),
//!         voxel_density: 0.25,
//!         ..Default::default()
//!     };
//!     let voxelizer = Voxelizer::new(config)?;
//!
//!     let mut scene = MeshScene::new();
//!     scene.add_box(Vec3::ZERO, Vec3::splat(1.0), Vec4::new(1.0, 0.5, 0.0, 1.0));
//!
//!     let mut store = FileStore::new("out");
//!     let report = voxelizer.bake(&mut scene, &mut store, "cube")?;
//!     println!("{} voxels occupied", report.occupancy);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`voxbake_core`] holds the device-independent sweep: descriptors, the
//!   capture rig, the sweep controller and a CPU reference backend.
//! - [`voxbake_render`] implements the sweep on wgpu.
//! - This crate ties both together behind [`Voxelizer`].

mod voxelizer;

pub use voxelizer::{voxelize_reference, BakeReport, Voxelizer};

// Re-export core types
pub use voxbake_core::{
    build_volume, AabbScene, AllocationTracker, Axis, CaptureError, CapturePose, CaptureRig,
    ConfigError, CpuBackend, CpuCaptureBuffer, CpuVolume, FilterHint, ImageDimension, Mat4,
    MaterializedImage, MemoryStore, Persistence, PixelFormat, Result, SceneCapture, SolidBox,
    SweepBackend,
    SweepController, SweepOutput, SweepProgress, SweepStats, UVec2, UVec3, Vec2, Vec3, Vec4,
    VolumeDescriptor, VoxelError, VoxelizerConfig,
};

// Re-export render types
pub use voxbake_render::{
    FileStore, GpuBackend, GpuCaptureBuffer, GpuImage, GpuVolume, Materializer, MeshScene,
    PendingTransfer, PersistError, RenderEngine, TransferError, TransferState,
};

pub use voxbake_render::wgpu;

/// Installs the `env_logger` backend, filtered by `RUST_LOG`.
///
/// Calling it more than once is harmless.
pub fn init_logging() {
    let _ = env_logger::try_init();
}
