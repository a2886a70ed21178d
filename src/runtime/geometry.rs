//! Kernel launch geometry
//!
//! The matmul kernel assigns one work item per output row. Work is launched as
//! a number of work groups of a fixed size; the pair is derived per call from
//! the output dimension and never stored.

/// Preferred work-group size for the matmul kernel
pub const LOCAL_GROUP_SIZE: usize = 64;

/// Work partitioning for one kernel launch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LaunchGeometry {
    /// Number of work groups launched
    pub global_size: usize,
    /// Work items per group
    pub local_size: usize,
}

impl LaunchGeometry {
    /// Geometry for `d` output rows using [`LOCAL_GROUP_SIZE`].
    #[inline]
    pub fn for_rows(d: usize) -> Self {
        Self::with_group_size(d, LOCAL_GROUP_SIZE)
    }

    /// Geometry for `d` output rows with preferred group size `group`.
    ///
    /// When `d` is a multiple of `group`, launches `d / group` groups of
    /// `group` items. Otherwise falls back to `d` groups of a single item so
    /// that every row is still covered exactly once.
    pub fn with_group_size(d: usize, group: usize) -> Self {
        if group > 0 && d % group == 0 {
            Self {
                global_size: d / group,
                local_size: group,
            }
        } else {
            Self {
                global_size: d,
                local_size: 1,
            }
        }
    }

    /// Total work items launched (`global_size * local_size`)
    #[inline]
    pub fn invocations(&self) -> usize {
        self.global_size * self.local_size
    }
}
