//! Sweep axes and the per-axis swizzle between capture pixels and voxels.

use std::fmt;

use glam::{UVec2, UVec3, Vec3};
use serde::{Deserialize, Serialize};

/// One of the six axis-aligned sweep directions.
///
/// Exactly one axis is active for any capture + accumulate step; the kernel
/// receives it as a value rather than as shared flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Looking down positive X.
    #[serde(rename = "+X")]
    PosX,
    /// Looking down negative X.
    #[serde(rename = "-X")]
    NegX,
    /// Looking down positive Y.
    #[serde(rename = "+Y")]
    PosY,
    /// Looking down negative Y.
    #[serde(rename = "-Y")]
    NegY,
    /// Looking down positive Z.
    #[serde(rename = "+Z")]
    PosZ,
    /// Looking down negative Z.
    #[serde(rename = "-Z")]
    NegZ,
}

impl Axis {
    /// The fixed processing order of a full sweep.
    pub const SWEEP_ORDER: [Axis; 6] = [
        Axis::PosX,
        Axis::NegX,
        Axis::PosY,
        Axis::NegY,
        Axis::PosZ,
        Axis::NegZ,
    ];

    /// Returns the unit vector the capture rig looks along.
    #[must_use]
    pub fn to_vec3(self) -> Vec3 {
        match self {
            Axis::PosX => Vec3::X,
            Axis::NegX => Vec3::NEG_X,
            Axis::PosY => Vec3::Y,
            Axis::NegY => Vec3::NEG_Y,
            Axis::PosZ => Vec3::Z,
            Axis::NegZ => Vec3::NEG_Z,
        }
    }

    /// Returns display name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Axis::PosX => "+X",
            Axis::NegX => "-X",
            Axis::PosY => "+Y",
            Axis::NegY => "-Y",
            Axis::PosZ => "+Z",
            Axis::NegZ => "-Z",
        }
    }

    /// Returns whether this is the negative-direction pass of its axis.
    #[must_use]
    pub fn is_negative(self) -> bool {
        matches!(self, Axis::NegX | Axis::NegY | Axis::NegZ)
    }

    /// Index of the vector component this axis sweeps along (0 = x, 1 = y, 2 = z).
    #[must_use]
    pub fn component(self) -> usize {
        match self {
            Axis::PosX | Axis::NegX => 0,
            Axis::PosY | Axis::NegY => 1,
            Axis::PosZ | Axis::NegZ => 2,
        }
    }

    /// Up vector of the capture rig for this axis.
    ///
    /// Y sweeps use +Z as up since +Y would be parallel to the view direction.
    #[must_use]
    pub fn up(self) -> Vec3 {
        match self {
            Axis::PosY | Axis::NegY => Vec3::Z,
            _ => Vec3::Y,
        }
    }

    /// Returns the coordinate mapping between capture pixels and volume voxels.
    ///
    /// The table follows from the rig orientation: image `u` grows along the
    /// camera right vector (`forward x up`), image `v` grows against up.
    #[must_use]
    pub fn swizzle(self) -> Swizzle {
        let (u, flip_u, v, flip_v) = match self {
            Axis::PosX => (2, false, 1, true),
            Axis::NegX => (2, true, 1, true),
            Axis::PosY => (0, false, 2, true),
            Axis::NegY => (0, true, 2, true),
            Axis::PosZ => (0, true, 1, true),
            Axis::NegZ => (0, false, 1, true),
        };
        Swizzle {
            sweep: self.component(),
            u,
            v,
            flip_u,
            flip_v,
        }
    }

    /// Maps a slice index of this pass to the volume plane it samples.
    ///
    /// Positive passes walk planes `0..count`, negative passes walk them in
    /// reverse, so every plane is sampled once per direction.
    #[must_use]
    pub fn plane_index(self, slice: u32, count: u32) -> u32 {
        if self.is_negative() {
            count - 1 - slice
        } else {
            slice
        }
    }

    /// Converts from a u32 index. Order: 0=+X, 1=-X, 2=+Y, 3=-Y, 4=+Z, 5=-Z.
    #[must_use]
    pub fn from_index(index: u32) -> Option<Self> {
        Self::SWEEP_ORDER.get(index as usize).copied()
    }

    /// Converts to a u32 index.
    #[must_use]
    pub fn to_index(self) -> u32 {
        match self {
            Axis::PosX => 0,
            Axis::NegX => 1,
            Axis::PosY => 2,
            Axis::NegY => 3,
            Axis::PosZ => 4,
            Axis::NegZ => 5,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reordering and mirroring of coordinates between a capture and the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swizzle {
    /// Volume component along the sweep direction.
    pub sweep: usize,
    /// Volume component that maps to capture `u` (pixel column).
    pub u: usize,
    /// Volume component that maps to capture `v` (pixel row).
    pub v: usize,
    /// Whether `u` runs against the volume component.
    pub flip_u: bool,
    /// Whether `v` runs against the volume component.
    pub flip_v: bool,
}

impl Swizzle {
    /// Capture buffer size for a volume of the given resolution.
    #[must_use]
    pub fn capture_size(&self, resolution: UVec3) -> UVec2 {
        UVec2::new(resolution[self.u], resolution[self.v])
    }

    /// Pixel that holds the sample for `voxel`.
    #[must_use]
    pub fn voxel_to_pixel(&self, voxel: UVec3, resolution: UVec3) -> UVec2 {
        let mut u = voxel[self.u];
        let mut v = voxel[self.v];
        if self.flip_u {
            u = resolution[self.u] - 1 - u;
        }
        if self.flip_v {
            v = resolution[self.v] - 1 - v;
        }
        UVec2::new(u, v)
    }

    /// Voxel on `plane` that `pixel` is written to.
    #[must_use]
    pub fn pixel_to_voxel(&self, pixel: UVec2, plane: u32, resolution: UVec3) -> UVec3 {
        let mut voxel = UVec3::ZERO;
        voxel[self.sweep] = plane;
        voxel[self.u] = if self.flip_u {
            resolution[self.u] - 1 - pixel.x
        } else {
            pixel.x
        };
        voxel[self.v] = if self.flip_v {
            resolution[self.v] - 1 - pixel.y
        } else {
            pixel.y
        };
        voxel
    }
}
