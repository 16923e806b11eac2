//! GPU-resident images awaiting materialization.

use glam::UVec3;
use voxbake_core::{AllocationGuard, FilterHint, ImageDimension, PixelFormat};

use crate::engine::RenderEngine;
use crate::error::{RenderError, RenderResult};

/// Maps a pixel format to the matching wgpu texture format.
#[must_use]
pub fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        PixelFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
        PixelFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        PixelFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        PixelFormat::R32Float => wgpu::TextureFormat::R32Float,
    }
}

/// Where the pixels of a [`GpuImage`] live.
#[derive(Debug)]
pub enum GpuStorage {
    /// A 2D or 3D texture.
    Texture(wgpu::Texture),
    /// A tightly packed buffer, x fastest, then y, then z.
    Buffer(wgpu::Buffer),
}

/// A 2D or 3D image owned by the device.
///
/// The device memory is released when the image is dropped.
#[derive(Debug)]
pub struct GpuImage {
    storage: GpuStorage,
    size: UVec3,
    dimension: ImageDimension,
    format: PixelFormat,
    filter: FilterHint,
    _guard: Option<AllocationGuard>,
}

impl GpuImage {
    /// Wraps a texture. Its usage must include `COPY_SRC`.
    #[must_use]
    pub fn from_texture(texture: wgpu::Texture, format: PixelFormat, filter: FilterHint) -> Self {
        let extent = texture.size();
        let (depth, dimension) = match texture.dimension() {
            wgpu::TextureDimension::D3 => (extent.depth_or_array_layers, ImageDimension::D3),
            _ => (1, ImageDimension::D2),
        };
        Self {
            storage: GpuStorage::Texture(texture),
            size: UVec3::new(extent.width, extent.height, depth),
            dimension,
            format,
            filter,
            _guard: None,
        }
    }

    /// Wraps a packed buffer of `size` pixels. Its usage must include `COPY_SRC`.
    ///
    /// The buffer is treated as a volume if `size.z > 1`; see [`Self::as_volume`].
    #[must_use]
    pub fn from_buffer(
        buffer: wgpu::Buffer,
        size: UVec3,
        format: PixelFormat,
        filter: FilterHint,
    ) -> Self {
        Self {
            storage: GpuStorage::Buffer(buffer),
            size,
            dimension: ImageDimension::from_depth(size.z),
            format,
            filter,
            _guard: None,
        }
    }

    /// Marks this image as a volume, even if it is one layer deep.
    #[must_use]
    pub fn as_volume(mut self) -> Self {
        self.dimension = ImageDimension::D3;
        self
    }

    /// Ties an allocation guard to the lifetime of this image.
    #[must_use]
    pub fn with_guard(mut self, guard: AllocationGuard) -> Self {
        self._guard = Some(guard);
        self
    }

    /// Uploads tightly packed pixel bytes into a new texture.
    ///
    /// `size.z == 1` creates a 2D texture, anything larger a 3D texture.
    pub fn upload(
        engine: &RenderEngine,
        size: UVec3,
        format: PixelFormat,
        filter: FilterHint,
        data: &[u8],
    ) -> RenderResult<Self> {
        let bpp = format.bytes_per_pixel();
        let expected = u64::from(size.x) * u64::from(size.y) * u64::from(size.z) * u64::from(bpp);
        if data.len() as u64 != expected {
            return Err(RenderError::AllocationFailed(format!(
                "upload of {} bytes for a {size} image of {expected} bytes",
                data.len()
            )));
        }

        let dimension = if size.z > 1 {
            wgpu::TextureDimension::D3
        } else {
            wgpu::TextureDimension::D2
        };
        let extent = wgpu::Extent3d {
            width: size.x,
            height: size.y,
            depth_or_array_layers: size.z,
        };
        let texture = crate::buffer::scoped_allocation(&engine.device, "upload texture", |device| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("upload texture"),
                size: extent,
                mip_level_count: 1,
                sample_count: 1,
                dimension,
                format: texture_format(format),
                usage: wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC
                    | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            })
        })?;

        engine.queue.write_texture(
            texture.as_image_copy(),
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(size.x * bpp),
                rows_per_image: Some(size.y),
            },
            extent,
        );

        Ok(Self::from_texture(texture, format, filter))
    }

    pub fn storage(&self) -> &GpuStorage {
        &self.storage
    }

    /// Width, height and depth in pixels.
    pub fn size(&self) -> UVec3 {
        self.size
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn filter(&self) -> FilterHint {
        self.filter
    }

    pub fn dimension(&self) -> ImageDimension {
        self.dimension
    }

    /// Whether this image is a volume.
    pub fn is_3d(&self) -> bool {
        self.dimension == ImageDimension::D3
    }

    /// Size of the tightly packed pixel data in bytes.
    pub fn byte_size(&self) -> u64 {
        u64::from(self.size.x)
            * u64::from(self.size.y)
            * u64::from(self.size.z)
            * u64::from(self.format.bytes_per_pixel())
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        match &self.storage {
            GpuStorage::Texture(texture) => texture.destroy(),
            GpuStorage::Buffer(buffer) => buffer.destroy(),
        }
    }
}
