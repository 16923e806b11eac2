//! Device backend and scene capture seams of the sweep controller.

use glam::{UVec2, UVec3};
use thiserror::Error;

use crate::descriptor::VolumeDescriptor;
use crate::error::Result;
use crate::kernel::KernelPass;
use crate::resource::AllocationTracker;
use crate::rig::CapturePose;

/// A device that owns capture buffers and volume buffers and runs the
/// accumulation kernel over them.
///
/// Buffers are released when the returned handles are dropped.
pub trait SweepBackend {
    /// 2D image the scene is captured into.
    type CaptureTarget;
    /// 3D image the sweep accumulates into.
    type Volume;

    /// Allocates a volume sized to the descriptor's resolution.
    ///
    /// Contents are undefined until the clear pass runs.
    fn allocate_volume(&mut self, descriptor: &VolumeDescriptor) -> Result<Self::Volume>;

    /// Allocates a capture target of `size` pixels.
    fn allocate_capture(&mut self, size: UVec2) -> Result<Self::CaptureTarget>;

    /// Runs the accumulation kernel with `groups` work groups.
    fn dispatch_kernel(
        &mut self,
        volume: &mut Self::Volume,
        pass: KernelPass<'_, Self::CaptureTarget>,
        groups: UVec3,
    ) -> Result<()>;

    /// Work-group size the kernel was compiled with.
    fn work_group_size(&self) -> UVec3;

    /// Tracker for every buffer this backend hands out.
    fn allocations(&self) -> &AllocationTracker;
}

/// The scene could not be rendered into a capture target.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct CaptureError {
    reason: String,
}

impl CaptureError {
    /// Creates a capture error with a human readable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The reason given when the error was created.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Renders the scene from an orthographic pose into a capture target.
pub trait SceneCapture<B: SweepBackend + ?Sized> {
    /// Renders into `target`, replacing its previous contents.
    fn capture(
        &mut self,
        backend: &mut B,
        pose: &CapturePose,
        target: &mut B::CaptureTarget,
    ) -> std::result::Result<(), CaptureError>;
}

impl<B, F> SceneCapture<B> for F
where
    B: SweepBackend + ?Sized,
    F: FnMut(&mut B, &CapturePose, &mut B::CaptureTarget) -> std::result::Result<(), CaptureError>,
{
    fn capture(
        &mut self,
        backend: &mut B,
        pose: &CapturePose,
        target: &mut B::CaptureTarget,
    ) -> std::result::Result<(), CaptureError> {
        self(backend, pose, target)
    }
}
