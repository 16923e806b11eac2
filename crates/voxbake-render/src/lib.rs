//! GPU backend for voxbake.
//!
//! This crate provides the wgpu implementation of the sweep:
//! - a headless [`RenderEngine`] with device-loss tracking
//! - [`GpuBackend`], implementing [`voxbake_core::SweepBackend`] with
//!   render-target captures and a compute accumulation kernel
//! - [`MeshScene`], a rasterized triangle scene for captures
//! - [`Materializer`] for GPU to CPU transfers, blocking or polled
//! - [`FileStore`], persisting images as PNG or raw volumes

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// Texture sizes fit comfortably in usize and f32
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod backend;
pub mod buffer;
pub mod engine;
pub mod error;
pub mod image;
pub mod kernel;
pub mod materialize;
pub mod mesh_scene;
pub mod shader;
pub mod store;

pub use wgpu;

pub use backend::{GpuBackend, GpuCaptureBuffer, GpuVolume, VOLUME_FORMAT};
pub use engine::RenderEngine;
pub use error::{RenderError, RenderResult, TransferError};
pub use image::{texture_format, GpuImage, GpuStorage};
pub use kernel::AccumulationKernel;
pub use materialize::{Materializer, PendingTransfer, TransferState};
pub use mesh_scene::{CaptureUniforms, MeshScene, SceneMesh};
pub use shader::ShaderBuilder;
pub use store::{encode_png, save_image, FileStore, PersistError, VolumeHeader};
