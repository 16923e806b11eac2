//! Core abstractions for voxbake.
//!
//! This crate provides the device-independent parts of the six-axis
//! voxelizer:
//! - [`VolumeDescriptor`] for grid extents, density and resolution
//! - [`Axis`] and its [`Swizzle`] between capture pixels and voxels
//! - [`CaptureRig`] orthographic poses per axis and slice
//! - [`SweepController`], generic over a [`SweepBackend`] device and a
//!   [`SceneCapture`] collaborator
//! - the accumulation kernel contract and a host-memory reference backend
//! - [`MaterializedImage`] and the [`Persistence`] seam

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Grid sizes are far below f32 precision limits
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod axis;
pub mod backend;
pub mod config;
pub mod cpu;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod image;
pub mod kernel;
pub mod persist;
pub mod resource;
pub mod rig;
pub mod sweep;

pub use axis::{Axis, Swizzle};
pub use backend::{CaptureError, SceneCapture, SweepBackend};
pub use config::VoxelizerConfig;
pub use cpu::{AabbScene, CpuBackend, CpuCaptureBuffer, CpuVolume, SolidBox};
pub use descriptor::{VolumeDescriptor, MAX_RESOLUTION};
pub use dispatch::{dispatch_size, validate_work_group_size, DEFAULT_WORK_GROUP_SIZE};
pub use error::{ConfigError, Result, VoxelError};
pub use image::{FilterHint, ImageDimension, MaterializedImage, PixelFormat};
pub use kernel::{combine, Invocation, KernelPass, KernelUniforms, BACKGROUND};
pub use persist::{MemoryStore, Persistence};
pub use resource::{AllocationGuard, AllocationTracker};
pub use rig::{CapturePose, CaptureRig, SLAB_BOUNDARY_TOLERANCE};
pub use sweep::{build_volume, SweepController, SweepOutput, SweepProgress, SweepStats};

// Re-export glam types for convenience
pub use glam::{Mat4, UVec2, UVec3, Vec2, Vec3, Vec4};
