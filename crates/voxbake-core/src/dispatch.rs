//! Work-group sizing for the accumulation kernel.

use glam::UVec3;

use crate::error::ConfigError;

/// Default work-group size compiled into the accumulation kernel.
///
/// 8x8x4 stays within the 256-invocation limit of default wgpu devices.
pub const DEFAULT_WORK_GROUP_SIZE: UVec3 = UVec3::new(8, 8, 4);

/// Maximum invocations per work group on default devices.
pub const MAX_INVOCATIONS_PER_WORK_GROUP: u32 = 256;

/// Maximum work-group size per dimension on default devices.
pub const MAX_WORK_GROUP_SIZE: UVec3 = UVec3::new(256, 256, 64);

/// Checks that a work-group size can be compiled and dispatched.
pub fn validate_work_group_size(size: UVec3) -> Result<UVec3, ConfigError> {
    let invalid = |reason| ConfigError::InvalidWorkGroupSize {
        size: size.to_array(),
        reason,
    };
    if size.cmpeq(UVec3::ZERO).any() {
        return Err(invalid("every dimension must be at least 1"));
    }
    if size.cmpgt(MAX_WORK_GROUP_SIZE).any() {
        return Err(invalid("exceeds the per-dimension limit of [256, 256, 64]"));
    }
    if size.x * size.y * size.z > MAX_INVOCATIONS_PER_WORK_GROUP {
        return Err(invalid("more than 256 invocations per group"));
    }
    Ok(size)
}

/// Number of work groups needed to cover `resolution`.
///
/// Rounds up, so the kernel must discard invocations outside the grid.
#[must_use]
pub fn dispatch_size(resolution: UVec3, group_size: UVec3) -> UVec3 {
    UVec3::new(
        resolution.x.div_ceil(group_size.x),
        resolution.y.div_ceil(group_size.y),
        resolution.z.div_ceil(group_size.z),
    )
}

/// Iterates every global invocation id of a dispatch, in group order.
pub fn invocations(groups: UVec3, group_size: UVec3) -> impl Iterator<Item = UVec3> {
    let total = groups * group_size;
    (0..total.z).flat_map(move |z| {
        (0..total.y).flat_map(move |y| (0..total.x).map(move |x| UVec3::new(x, y, z)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_exact_multiple_has_no_extra_group() {
        assert_eq!(
            dispatch_size(UVec3::new(16, 16, 8), UVec3::new(8, 8, 4)),
            UVec3::new(2, 2, 2)
        );
    }

    #[test]
    fn test_partial_groups_round_up() {
        assert_eq!(
            dispatch_size(UVec3::new(10, 10, 10), UVec3::new(8, 8, 4)),
            UVec3::new(2, 2, 3)
        );
        assert_eq!(dispatch_size(UVec3::ONE, UVec3::new(8, 8, 4)), UVec3::ONE);
    }

    #[test]
    fn test_validate_work_group_size() {
        assert!(validate_work_group_size(UVec3::new(8, 8, 4)).is_ok());
        assert!(validate_work_group_size(UVec3::new(4, 4, 4)).is_ok());
        assert!(validate_work_group_size(UVec3::new(8, 8, 8)).is_err());
        assert!(validate_work_group_size(UVec3::new(0, 8, 1)).is_err());
        assert!(validate_work_group_size(UVec3::new(1, 1, 128)).is_err());
    }

    #[test]
    fn test_invocations_cover_padded_grid() {
        let ids: Vec<_> = invocations(UVec3::new(2, 1, 1), UVec3::new(2, 1, 1)).collect();
        assert_eq!(ids.len(), 4);
        assert_eq!(ids[3], UVec3::new(3, 0, 0));
    }

    proptest! {
        #[test]
        fn prop_dispatch_covers_resolution(
            rx in 1u32..500, ry in 1u32..500, rz in 1u32..500,
            gx in 1u32..16, gy in 1u32..16, gz in 1u32..16,
        ) {
            let resolution = UVec3::new(rx, ry, rz);
            let group = UVec3::new(gx, gy, gz);
            let groups = dispatch_size(resolution, group);
            for i in 0..3 {
                prop_assert!(groups[i] * group[i] >= resolution[i]);
                prop_assert!((groups[i] - 1) * group[i] < resolution[i]);
                if resolution[i] % group[i] == 0 {
                    prop_assert_eq!(groups[i], resolution[i] / group[i]);
                }
            }
        }
    }
}
