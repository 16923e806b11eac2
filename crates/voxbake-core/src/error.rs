//! Error types for voxbake.

use thiserror::Error;

use crate::axis::Axis;
use crate::image::PixelFormat;

/// Invalid configuration, detected before any GPU allocation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Voxel density is zero, negative, or not finite.
    #[error("voxel density must be positive and finite, got {0}")]
    NonPositiveDensity(f32),

    /// One of the extent components is zero, negative, or not finite.
    #[error("volume extent must be positive and finite, got [{}, {}, {}]", .0[0], .0[1], .0[2])]
    NonPositiveExtent([f32; 3]),

    /// A resolution component is zero.
    #[error("volume resolution must be at least 1 in every dimension, got [{}, {}, {}]", .0[0], .0[1], .0[2])]
    ZeroResolution([u32; 3]),

    /// A resolution component exceeds what a 3D image can hold.
    #[error("volume resolution {resolution} exceeds the per-axis limit of {limit}")]
    ResolutionTooLarge { resolution: f32, limit: u32 },

    /// The work group size cannot be compiled into the accumulation kernel.
    #[error("work group size [{}, {}, {}] is invalid: {reason}", .size[0], .size[1], .size[2])]
    InvalidWorkGroupSize { size: [u32; 3], reason: &'static str },

    /// The capture format has no alpha channel to carry coverage.
    #[error("capture format {0:?} has no coverage channel")]
    UnsupportedCaptureFormat(PixelFormat),

    /// The presence threshold is outside `[0, 1)`.
    #[error("presence threshold must lie in [0, 1), got {0}")]
    InvalidPresenceThreshold(f32),

    /// An axis was listed twice in the sweep order.
    #[error("axis {0} appears more than once in the sweep order")]
    DuplicateAxis(Axis),

    /// The sweep order lists no axes.
    #[error("sweep order is empty")]
    EmptySweepOrder,
}

/// The main error type for voxbake operations.
#[derive(Error, Debug)]
pub enum VoxelError {
    /// Configuration was rejected.
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),

    /// The scene could not be captured for one slice; the sweep was aborted.
    #[error("capture failed on axis {axis}, slice {slice}: {reason}")]
    CaptureFailure {
        axis: Axis,
        slice: u32,
        reason: String,
    },

    /// Copying pixels from the GPU failed or the device was lost.
    #[error("GPU to CPU transfer failed: {0}")]
    TransferFailure(String),

    /// The persistence collaborator refused the image.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// The device backend could not allocate or dispatch.
    #[error("backend error: {0}")]
    Backend(String),

    /// Pixel data length does not match the image dimensions.
    #[error("data size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for voxbake operations.
pub type Result<T> = std::result::Result<T, VoxelError>;
