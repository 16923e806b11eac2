//! File-backed persistence for materialized images.
//!
//! 2D images are written as PNG. 3D images are written as raw texel bytes
//! (`<path>.raw`) next to a JSON header (`<path>.json`) describing the
//! layout.

use std::path::{Component, Path, PathBuf};

use glam::UVec3;
use image::{ImageBuffer, Rgba};
use serde::{Deserialize, Serialize};
use voxbake_core::{FilterHint, MaterializedImage, Persistence, PixelFormat};

/// Layout of a raw volume file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeHeader {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: PixelFormat,
    pub filter: FilterHint,
    pub byte_length: u64,
}

/// Writes images under a root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reads back a volume written by [`Persistence::store`].
    pub fn load_volume(&self, logical_path: &str) -> Result<MaterializedImage, PersistError> {
        let path = self.resolve(logical_path)?;
        let header: VolumeHeader =
            serde_json::from_str(&std::fs::read_to_string(path.with_extension("json"))?)?;
        let data = std::fs::read(path.with_extension("raw"))?;
        if data.len() as u64 != header.byte_length {
            return Err(PersistError::InvalidImageData(format!(
                "header declares {} bytes, file has {}",
                header.byte_length,
                data.len()
            )));
        }
        MaterializedImage::volume(
            UVec3::new(header.width, header.height, header.depth),
            header.format,
            header.filter,
            data,
        )
        .map_err(|err| PersistError::InvalidImageData(err.to_string()))
    }

    fn resolve(&self, logical_path: &str) -> Result<PathBuf, PersistError> {
        let relative = Path::new(logical_path);
        let valid = !logical_path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !valid {
            return Err(PersistError::InvalidPath(logical_path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl Persistence for FileStore {
    type Error = PersistError;

    fn store(&mut self, image: MaterializedImage, logical_path: &str) -> Result<(), PersistError> {
        let path = self.resolve(logical_path)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if image.is_3d() {
            write_volume(&path, &image)?;
        } else {
            let path = if path.extension().is_some() {
                path
            } else {
                path.with_extension("png")
            };
            save_image(&path, &image)?;
        }
        log::info!("stored {logical_path} under {}", self.root.display());
        Ok(())
    }
}

/// Saves a 2D image to a PNG or JPEG file, chosen by extension.
pub fn save_image(path: &Path, image: &MaterializedImage) -> Result<(), PersistError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let img = to_image_buffer(image)?;
    match extension.as_str() {
        "png" => {
            img.save_with_format(path, image::ImageFormat::Png)?;
        }
        "jpg" | "jpeg" => {
            // JPEG has no alpha
            let rgb_img = image::DynamicImage::ImageRgba8(img).to_rgb8();
            rgb_img.save_with_format(path, image::ImageFormat::Jpeg)?;
        }
        _ => {
            return Err(PersistError::UnsupportedFormat(extension));
        }
    }
    Ok(())
}

/// Encodes a 2D image as PNG in memory.
pub fn encode_png(image: &MaterializedImage) -> Result<Vec<u8>, PersistError> {
    let img = to_image_buffer(image)?;
    let mut buffer = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

fn write_volume(path: &Path, image: &MaterializedImage) -> Result<(), PersistError> {
    let header = VolumeHeader {
        width: image.width(),
        height: image.height(),
        depth: image.depth(),
        format: image.format(),
        filter: image.filter(),
        byte_length: image.data().len() as u64,
    };
    std::fs::write(path.with_extension("raw"), image.data())?;
    std::fs::write(
        path.with_extension("json"),
        serde_json::to_string_pretty(&header)?,
    )?;
    Ok(())
}

fn to_image_buffer(image: &MaterializedImage) -> Result<ImageBuffer<Rgba<u8>, Vec<u8>>, PersistError> {
    if image.is_3d() {
        return Err(PersistError::UnsupportedFormat(format!(
            "{}-layer image",
            image.depth()
        )));
    }
    ImageBuffer::from_raw(image.width(), image.height(), to_rgba8(image))
        .ok_or_else(|| PersistError::InvalidImageData("pixel count mismatch".into()))
}

/// Converts pixel bytes of any supported format to 8-bit RGBA.
fn to_rgba8(image: &MaterializedImage) -> Vec<u8> {
    let format = image.format();
    match format {
        PixelFormat::Rgba8Unorm | PixelFormat::Rgba8UnormSrgb => image.data().to_vec(),
        PixelFormat::Bgra8Unorm => {
            let mut rgba_data = image.data().to_vec();
            for chunk in rgba_data.chunks_exact_mut(4) {
                chunk.swap(0, 2); // Swap B and R
            }
            rgba_data
        }
        PixelFormat::Rgba16Float | PixelFormat::Rgba32Float | PixelFormat::R32Float => image
            .data()
            .chunks_exact(format.bytes_per_pixel() as usize)
            .filter_map(|texel| format.decode(texel))
            .flatten()
            .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect(),
    }
}

/// Error type for persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image encoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Header encoding error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid logical path: {0:?}")]
    InvalidPath(String),

    #[error("Invalid image data: {0}")]
    InvalidImageData(String),
}
