//! Configuration for voxbake.

use std::path::Path;

use glam::{UVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::axis::Axis;
use crate::descriptor::VolumeDescriptor;
use crate::dispatch::{validate_work_group_size, DEFAULT_WORK_GROUP_SIZE};
use crate::error::{ConfigError, Result};
use crate::image::PixelFormat;
use crate::sweep::validate_sweep_order;

/// Values the voxelizer is configured with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelizerConfig {
    /// World-space size of the volume.
    pub extent: Vec3,

    /// World units per voxel edge.
    pub voxel_density: f32,

    /// World-space center of the volume.
    pub center: Vec3,

    /// Pixel format of capture targets.
    pub capture_format: PixelFormat,

    /// Work-group size compiled into the accumulation kernel.
    pub work_group_size: UVec3,

    /// Alpha above which a capture pixel counts as geometry.
    pub presence_threshold: f32,

    /// Axis processing order.
    pub axes: Vec<Axis>,
}

impl Default for VoxelizerConfig {
    fn default() -> Self {
        Self {
            extent: Vec3::splat(10.0),
            voxel_density: 1.0,
            center: Vec3::ZERO,
            capture_format: PixelFormat::Rgba8Unorm,
            work_group_size: DEFAULT_WORK_GROUP_SIZE,
            presence_threshold: 0.0,
            axes: Axis::SWEEP_ORDER.to_vec(),
        }
    }
}

impl VoxelizerConfig {
    /// Parses a configuration from JSON; missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        log::info!("loaded voxelizer config from {}", path.display());
        Ok(config)
    }

    /// Serializes the configuration as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks every value without building anything.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.descriptor()?;
        validate_work_group_size(self.work_group_size)?;
        if !self.capture_format.has_alpha() {
            return Err(ConfigError::UnsupportedCaptureFormat(self.capture_format));
        }
        if !(0.0..1.0).contains(&self.presence_threshold) {
            return Err(ConfigError::InvalidPresenceThreshold(self.presence_threshold));
        }
        validate_sweep_order(&self.axes)
    }

    /// Builds the immutable volume descriptor.
    pub fn descriptor(&self) -> std::result::Result<VolumeDescriptor, ConfigError> {
        Ok(VolumeDescriptor::new(self.extent, self.voxel_density)?.with_center(self.center))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = VoxelizerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.descriptor().unwrap().resolution(), UVec3::splat(10));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = VoxelizerConfig::from_json_str(
            r#"{ "extent": [2.0, 4.0, 8.0], "voxel_density": 0.5, "axes": ["+Z", "-X"] }"#,
        )
        .unwrap();
        assert_eq!(config.descriptor().unwrap().resolution(), UVec3::new(4, 8, 16));
        assert_eq!(config.axes, vec![Axis::PosZ, Axis::NegX]);
        assert_eq!(config.work_group_size, DEFAULT_WORK_GROUP_SIZE);
    }

    #[test]
    fn test_json_round_trip() {
        let config = VoxelizerConfig {
            capture_format: PixelFormat::Rgba16Float,
            presence_threshold: 0.25,
            ..Default::default()
        };
        let back = VoxelizerConfig::from_json_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_rejections() {
        let bad = |config: VoxelizerConfig| config.validate().unwrap_err();
        assert_eq!(
            bad(VoxelizerConfig {
                voxel_density: 0.0,
                ..Default::default()
            }),
            ConfigError::NonPositiveDensity(0.0)
        );
        assert_eq!(
            bad(VoxelizerConfig {
                capture_format: PixelFormat::R32Float,
                ..Default::default()
            }),
            ConfigError::UnsupportedCaptureFormat(PixelFormat::R32Float)
        );
        assert_eq!(
            bad(VoxelizerConfig {
                presence_threshold: 1.0,
                ..Default::default()
            }),
            ConfigError::InvalidPresenceThreshold(1.0)
        );
        assert!(matches!(
            bad(VoxelizerConfig {
                work_group_size: UVec3::new(8, 8, 8),
                ..Default::default()
            }),
            ConfigError::InvalidWorkGroupSize { .. }
        ));
        assert_eq!(
            bad(VoxelizerConfig {
                axes: vec![Axis::PosX, Axis::PosX],
                ..Default::default()
            }),
            ConfigError::DuplicateAxis(Axis::PosX)
        );
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(VoxelizerConfig::from_json_str("{ \"extent\": 3 }").is_err());
        assert!(VoxelizerConfig::from_json_str("{ \"voxel_density\": -1 }").is_err());
    }
}
