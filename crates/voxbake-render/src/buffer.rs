//! GPU buffer helpers.

use wgpu::util::DeviceExt;

use crate::error::{RenderError, RenderResult};

/// Creates a uniform buffer from data.
pub fn create_uniform_buffer<T: bytemuck::Pod>(
    device: &wgpu::Device,
    data: &T,
    label: Option<&str>,
) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label,
        contents: bytemuck::bytes_of(data),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

/// Creates a vertex buffer of positions.
pub fn create_position_buffer(
    device: &wgpu::Device,
    positions: &[[f32; 3]],
    label: Option<&str>,
) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label,
        contents: bytemuck::cast_slice(positions),
        usage: wgpu::BufferUsages::VERTEX,
    })
}

/// Creates an index buffer of triangle indices.
pub fn create_index_buffer(
    device: &wgpu::Device,
    triangles: &[[u32; 3]],
    label: Option<&str>,
) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label,
        contents: bytemuck::cast_slice(triangles),
        usage: wgpu::BufferUsages::INDEX,
    })
}

/// Bytes per row of a texture copy, padded to `COPY_BYTES_PER_ROW_ALIGNMENT`.
#[must_use]
pub fn padded_bytes_per_row(width: u32, bytes_per_pixel: u32) -> u32 {
    let unpadded = width * bytes_per_pixel;
    unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
}

/// Rounds a buffer copy size up to `COPY_BUFFER_ALIGNMENT`.
#[must_use]
pub fn aligned_copy_size(size: u64) -> u64 {
    size.div_ceil(wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT
}

/// Runs `create` inside an out-of-memory error scope.
///
/// Allocation failures are reported through the scope instead of the
/// uncaptured error handler.
pub fn scoped_allocation<T>(
    device: &wgpu::Device,
    label: &str,
    create: impl FnOnce(&wgpu::Device) -> T,
) -> RenderResult<T> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let resource = create(device);
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    if let Some(err) = validation.or(out_of_memory) {
        return Err(RenderError::AllocationFailed(format!("{label}: {err}")));
    }
    Ok(resource)
}
