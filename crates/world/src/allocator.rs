//! Rotating container id allocation.

use voxelhost_core::ContainerId;

/// Hands out per-viewer container ids from `ContainerId::FIRST..=ContainerId::LAST`,
/// wrapping back to `FIRST` after `LAST`.
///
/// One allocator is shared by every container of a [`World`](crate::World).
#[derive(Debug, Clone)]
pub struct ContainerIdAllocator {
    next: i8,
}

impl ContainerIdAllocator {
    /// Fresh allocator starting at `FIRST`.
    pub fn new() -> Self {
        Self {
            next: ContainerId::FIRST.0,
        }
    }

    /// Next id in the rotation.
    pub fn allocate(&mut self) -> ContainerId {
        let id = ContainerId(self.next);
        self.next = if self.next >= ContainerId::LAST.0 {
            ContainerId::FIRST.0
        } else {
            self.next + 1
        };
        id
    }
}

impl Default for ContainerIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
