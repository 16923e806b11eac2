//! GPU error types.

use thiserror::Error;
use voxbake_core::VoxelError;

/// Errors that can occur while setting up the GPU.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// Shader compilation failed.
    #[error("shader compilation failed: {0}")]
    ShaderCompilationFailed(String),

    /// Texture or buffer allocation failed.
    #[error("allocation failed: {0}")]
    AllocationFailed(String),

    /// Scene geometry is malformed.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A texture of this size cannot be created on the device.
    #[error("{kind} size {size:?} exceeds the device limit of {limit}")]
    ExceedsLimit {
        kind: &'static str,
        size: [u32; 3],
        limit: u64,
    },
}

/// A specialized Result type for GPU setup.
pub type RenderResult<T> = std::result::Result<T, RenderError>;

/// Errors that can occur while copying an image from the GPU to the CPU.
///
/// A failed transfer never produces an image; callers must not persist it.
#[derive(Error, Debug)]
pub enum TransferError {
    /// The image has no pixels.
    #[error("image has zero size")]
    EmptyImage,

    /// The copy was rejected by validation.
    #[error("copy rejected: {0}")]
    Validation(String),

    /// The device ran out of memory for the staging buffer.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// Mapping the staging buffer failed.
    #[error("GPU buffer mapping failed: {0}")]
    BufferMapFailed(#[from] wgpu::BufferAsyncError),

    /// Waiting on the device failed.
    #[error("device poll failed: {0}")]
    PollFailed(#[from] wgpu::PollError),

    /// The device was lost before the transfer completed.
    #[error("device lost")]
    DeviceLost,

    /// The received bytes did not form an image.
    #[error("invalid image data: {0}")]
    InvalidImageData(String),
}

impl From<TransferError> for VoxelError {
    fn from(err: TransferError) -> Self {
        VoxelError::TransferFailure(err.to_string())
    }
}

impl From<RenderError> for VoxelError {
    fn from(err: RenderError) -> Self {
        VoxelError::Backend(err.to_string())
    }
}
