// SPDX-License-Identifier: MIT

pub use crate::core::errors::{AllocatorError, AllocatorResult};

/// Trait implemented by allocation handles.
pub trait FsHandle {}

/// Trait for managing allocation of blocks.
pub trait FsAllocator<Handle: FsHandle + Sized + Clone> {
    /// Reserves enough units to hold `size` bytes.
    fn allocate_bytes(&mut self, size: u64) -> AllocatorResult<Handle>;

    /// Releases every unit reachable from `handle`.
    fn release(&mut self, handle: &Handle) -> AllocatorResult<usize>;
}
