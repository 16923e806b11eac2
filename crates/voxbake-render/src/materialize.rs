//! GPU to CPU transfer of finished images.
//!
//! [`Materializer::begin`] records the copy into a mappable staging buffer
//! and requests the mapping. The returned [`PendingTransfer`] can be polled
//! without blocking ([`PendingTransfer::try_complete`]) or waited on
//! ([`PendingTransfer::wait`]). Either way the staging buffer and the
//! source image are released once the CPU image exists, and on every error
//! path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use glam::UVec3;
use voxbake_core::{AllocationGuard, AllocationTracker, FilterHint, MaterializedImage, PixelFormat};

use crate::buffer::{aligned_copy_size, padded_bytes_per_row};
use crate::engine::RenderEngine;
use crate::error::TransferError;
use crate::image::{GpuImage, GpuStorage};

type MapResult = Result<(), wgpu::BufferAsyncError>;

/// Starts GPU to CPU transfers on one device.
pub struct Materializer<'a> {
    engine: &'a RenderEngine,
    allocations: Option<AllocationTracker>,
}

impl<'a> Materializer<'a> {
    pub fn new(engine: &'a RenderEngine) -> Self {
        Self {
            engine,
            allocations: None,
        }
    }

    /// Records staging buffers in `tracker`.
    #[must_use]
    pub fn with_tracker(mut self, tracker: AllocationTracker) -> Self {
        self.allocations = Some(tracker);
        self
    }

    /// Copies `image` into host memory, blocking until the copy is done.
    pub fn materialize(&self, image: GpuImage) -> Result<MaterializedImage, TransferError> {
        let image = self.begin(image)?.wait()?;
        log::debug!(
            "materialized {}x{}x{} {:?} image ({} bytes)",
            image.width(),
            image.height(),
            image.depth(),
            image.format(),
            image.data().len()
        );
        Ok(image)
    }

    /// Submits the copy of `image` and requests the staging buffer mapping.
    pub fn begin(&self, image: GpuImage) -> Result<PendingTransfer, TransferError> {
        if self.engine.is_lost() {
            return Err(TransferError::DeviceLost);
        }
        let size = image.size();
        if size.cmpeq(UVec3::ZERO).any() {
            return Err(TransferError::EmptyImage);
        }

        let bytes_per_pixel = image.format().bytes_per_pixel();
        let unpadded_bytes_per_row = size.x * bytes_per_pixel;
        let padded_bytes_per_row = match image.storage() {
            GpuStorage::Texture(_) => padded_bytes_per_row(size.x, bytes_per_pixel),
            GpuStorage::Buffer(_) => unpadded_bytes_per_row,
        };
        let staging_size = aligned_copy_size(
            u64::from(padded_bytes_per_row) * u64::from(size.y) * u64::from(size.z),
        );

        let device = &self.engine.device;
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Materialize Staging Buffer"),
            size: staging_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Materialize Encoder"),
        });
        match image.storage() {
            GpuStorage::Texture(texture) => encoder.copy_texture_to_buffer(
                texture.as_image_copy(),
                wgpu::TexelCopyBufferInfo {
                    buffer: &staging,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(padded_bytes_per_row),
                        rows_per_image: Some(size.y),
                    },
                },
                wgpu::Extent3d {
                    width: size.x,
                    height: size.y,
                    depth_or_array_layers: size.z,
                },
            ),
            GpuStorage::Buffer(buffer) => {
                encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, image.byte_size());
            }
        }
        self.engine.queue.submit(std::iter::once(encoder.finish()));

        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        if let Some(err) = validation {
            staging.destroy();
            return Err(TransferError::Validation(err.to_string()));
        }
        if let Some(err) = out_of_memory {
            staging.destroy();
            return Err(TransferError::OutOfMemory(err.to_string()));
        }

        let (sender, receiver) = mpsc::channel();
        staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result: MapResult| {
                let _ = sender.send(result);
            });

        Ok(PendingTransfer {
            device: device.clone(),
            lost: self.engine.lost_flag(),
            staging,
            receiver,
            layout: RowLayout {
                padded_bytes_per_row,
                unpadded_bytes_per_row,
            },
            size,
            format: image.format(),
            filter: image.filter(),
            _guard: self.allocations.as_ref().map(|t| t.acquire("staging buffer")),
            source: image,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct RowLayout {
    padded_bytes_per_row: u32,
    unpadded_bytes_per_row: u32,
}

/// Outcome of polling a [`PendingTransfer`].
#[derive(Debug)]
pub enum TransferState {
    /// The image is in host memory.
    Ready(MaterializedImage),
    /// The copy is still in flight.
    Pending(PendingTransfer),
}

/// A GPU to CPU copy that has been submitted but not yet read back.
///
/// Dropping it abandons the transfer and releases both buffers.
#[derive(Debug)]
pub struct PendingTransfer {
    device: wgpu::Device,
    lost: Arc<AtomicBool>,
    staging: wgpu::Buffer,
    receiver: mpsc::Receiver<MapResult>,
    layout: RowLayout,
    size: UVec3,
    format: PixelFormat,
    filter: FilterHint,
    source: GpuImage,
    _guard: Option<AllocationGuard>,
}

impl PendingTransfer {
    /// Width, height and depth of the image being transferred.
    pub fn size(&self) -> UVec3 {
        self.size
    }

    /// Checks for completion without blocking.
    pub fn try_complete(self) -> Result<TransferState, TransferError> {
        self.device.poll(wgpu::PollType::Poll)?;
        match self.receiver.try_recv() {
            Ok(result) => {
                result?;
                self.finish().map(TransferState::Ready)
            }
            Err(mpsc::TryRecvError::Empty) => {
                if self.lost.load(Ordering::Acquire) {
                    return Err(TransferError::DeviceLost);
                }
                Ok(TransferState::Pending(self))
            }
            Err(mpsc::TryRecvError::Disconnected) => Err(TransferError::DeviceLost),
        }
    }

    /// Blocks until the copy is done.
    pub fn wait(self) -> Result<MaterializedImage, TransferError> {
        if self.lost.load(Ordering::Acquire) {
            return Err(TransferError::DeviceLost);
        }
        self.device.poll(wgpu::PollType::wait_indefinitely())?;
        let result = self
            .receiver
            .recv()
            .map_err(|_| TransferError::DeviceLost)?;
        result?;
        self.finish()
    }

    fn finish(self) -> Result<MaterializedImage, TransferError> {
        let RowLayout {
            padded_bytes_per_row,
            unpadded_bytes_per_row,
        } = self.layout;
        let rows = (self.size.y * self.size.z) as usize;
        let mut data = Vec::with_capacity(unpadded_bytes_per_row as usize * rows);
        {
            let mapped = self.staging.slice(..).get_mapped_range();
            for row in mapped
                .chunks(padded_bytes_per_row as usize)
                .take(rows)
            {
                data.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
            }
        }
        self.staging.unmap();
        self.staging.destroy();
        let volume = self.source.is_3d();
        drop(self.source);

        let image = MaterializedImage::new(self.size, self.format, self.filter, data)
            .map_err(|err| TransferError::InvalidImageData(err.to_string()))?;
        Ok(if volume { image.into_volume() } else { image })
    }
}

impl TransferState {
    /// The image, if the transfer has completed.
    pub fn ready(self) -> Option<MaterializedImage> {
        match self {
            TransferState::Ready(image) => Some(image),
            TransferState::Pending(_) => None,
        }
    }
}
