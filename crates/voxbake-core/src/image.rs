//! CPU-side image objects produced by materialization.

use glam::UVec3;
use half::f16;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VoxelError};

/// Pixel formats that captures and volumes can be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PixelFormat {
    /// 8-bit RGBA, linear.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA, sRGB encoded.
    Rgba8UnormSrgb,
    /// 8-bit BGRA, linear.
    Bgra8Unorm,
    /// 16-bit float RGBA.
    Rgba16Float,
    /// 32-bit float RGBA.
    Rgba32Float,
    /// Single 32-bit float channel.
    R32Float,
}

impl PixelFormat {
    /// Size of one pixel in bytes.
    #[must_use]
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Rgba8Unorm | PixelFormat::Rgba8UnormSrgb | PixelFormat::Bgra8Unorm => 4,
            PixelFormat::Rgba16Float => 8,
            PixelFormat::Rgba32Float => 16,
            PixelFormat::R32Float => 4,
        }
    }

    /// Whether the format has an alpha channel that can carry coverage.
    #[must_use]
    pub fn has_alpha(self) -> bool {
        !matches!(self, PixelFormat::R32Float)
    }

    /// Decodes one pixel into linear RGBA floats.
    ///
    /// Returns `None` if `texel` is shorter than one pixel. sRGB values are
    /// returned as stored; coverage lives in alpha which is never sRGB
    /// encoded.
    #[must_use]
    pub fn decode(self, texel: &[u8]) -> Option<[f32; 4]> {
        let texel = texel.get(..self.bytes_per_pixel() as usize)?;
        let unorm = |b: u8| f32::from(b) / 255.0;
        let rgba = match self {
            PixelFormat::Rgba8Unorm | PixelFormat::Rgba8UnormSrgb => {
                [unorm(texel[0]), unorm(texel[1]), unorm(texel[2]), unorm(texel[3])]
            }
            PixelFormat::Bgra8Unorm => {
                [unorm(texel[2]), unorm(texel[1]), unorm(texel[0]), unorm(texel[3])]
            }
            PixelFormat::Rgba16Float => {
                let mut out = [0.0; 4];
                for (value, bytes) in out.iter_mut().zip(texel.chunks_exact(2)) {
                    *value = f16::from_le_bytes([bytes[0], bytes[1]]).to_f32();
                }
                out
            }
            PixelFormat::Rgba32Float => {
                let mut out = [0.0; 4];
                for (value, bytes) in out.iter_mut().zip(texel.chunks_exact(4)) {
                    *value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                }
                out
            }
            PixelFormat::R32Float => {
                let r = f32::from_le_bytes([texel[0], texel[1], texel[2], texel[3]]);
                [r, 0.0, 0.0, r]
            }
        };
        Some(rgba)
    }
}

/// Filtering hint carried with an image for its consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FilterHint {
    /// Point sampling; the default for voxel data.
    #[default]
    Nearest,
    /// Linear interpolation.
    Linear,
}

/// Whether an image is a flat picture or a volume.
///
/// A volume stays a volume even when it is one layer deep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ImageDimension {
    #[default]
    D2,
    D3,
}

impl ImageDimension {
    /// Dimension implied by a layer count alone.
    #[must_use]
    pub fn from_depth(depth: u32) -> Self {
        if depth > 1 {
            ImageDimension::D3
        } else {
            ImageDimension::D2
        }
    }
}

/// A CPU-owned image: tightly packed pixel bytes plus layout metadata.
///
/// Rows are `width * bytes_per_pixel` bytes with no padding; layers follow
/// each other (x fastest, then y, then z).
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedImage {
    width: u32,
    height: u32,
    depth: u32,
    dimension: ImageDimension,
    format: PixelFormat,
    filter: FilterHint,
    data: Vec<u8>,
}

impl MaterializedImage {
    /// Wraps pixel bytes, checking that the length matches the dimensions.
    ///
    /// Images with more than one layer are volumes; use [`Self::volume`] for
    /// a volume of any depth.
    pub fn new(
        size: UVec3,
        format: PixelFormat,
        filter: FilterHint,
        data: Vec<u8>,
    ) -> Result<Self> {
        let expected = Self::byte_size(size, format);
        if data.len() != expected {
            return Err(VoxelError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width: size.x,
            height: size.y,
            depth: size.z,
            dimension: ImageDimension::from_depth(size.z),
            format,
            filter,
            data,
        })
    }

    /// Wraps the bytes of a volume, which may be a single layer deep.
    pub fn volume(
        size: UVec3,
        format: PixelFormat,
        filter: FilterHint,
        data: Vec<u8>,
    ) -> Result<Self> {
        Ok(Self::new(size, format, filter, data)?.into_volume())
    }

    /// Marks this image as a volume.
    #[must_use]
    pub fn into_volume(mut self) -> Self {
        self.dimension = ImageDimension::D3;
        self
    }

    /// Bytes needed for an image of `size` in `format`.
    #[must_use]
    pub fn byte_size(size: UVec3, format: PixelFormat) -> usize {
        size.x as usize * size.y as usize * size.z as usize * format.bytes_per_pixel() as usize
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn size(&self) -> UVec3 {
        UVec3::new(self.width, self.height, self.depth)
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

    /// Raw pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Takes ownership of the pixel bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Bytes of the texel at `(x, y, z)`, if inside the image.
    pub fn texel(&self, x: u32, y: u32, z: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height || z >= self.depth {
            return None;
        }
        let bpp = self.format.bytes_per_pixel() as usize;
        let index = x as usize
            + self.width as usize * (y as usize + self.height as usize * z as usize);
        self.data.get(index * bpp..(index + 1) * bpp)
    }

    /// Decoded RGBA value of the texel at `(x, y, z)`.
    pub fn rgba(&self, x: u32, y: u32, z: u32) -> Option<[f32; 4]> {
        self.texel(x, y, z).and_then(|t| self.format.decode(t))
    }

    /// Whether the texel at `voxel` holds geometry.
    pub fn is_present(&self, voxel: UVec3, threshold: f32) -> bool {
        self.rgba(voxel.x, voxel.y, voxel.z)
            .is_some_and(|rgba| rgba[3] > threshold)
    }

    /// Number of texels whose alpha exceeds `threshold`.
    pub fn occupancy(&self, threshold: f32) -> usize {
        let bpp = self.format.bytes_per_pixel() as usize;
        self.data
            .chunks_exact(bpp)
            .filter(|t| self.format.decode(t).is_some_and(|rgba| rgba[3] > threshold))
            .count()
    }

    /// Tight inclusive bounds of all present texels.
    pub fn presence_bounds(&self, threshold: f32) -> Option<(UVec3, UVec3)> {
        let mut bounds: Option<(UVec3, UVec3)> = None;
        for z in 0..self.depth {
            for y in 0..self.height {
                for x in 0..self.width {
                    let voxel = UVec3::new(x, y, z);
                    if !self.is_present(voxel, threshold) {
                        continue;
                    }
                    bounds = Some(match bounds {
                        Some((lo, hi)) => (lo.min(voxel), hi.max(voxel)),
                        None => (voxel, voxel),
                    });
                }
            }
        }
        bounds
    }
}
