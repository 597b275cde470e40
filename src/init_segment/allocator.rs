// SPDX-License-Identifier: GPL-2.0-or-later

use crate::AllocError;

/// Source of output buffers.
pub trait Allocator {
    /// Returns a zeroed buffer of exactly `size` bytes.
    fn alloc(&self, size: usize) -> Result<Vec<u8>, AllocError>;
}

/// Allocates from the global heap and reports
/// exhaustion as an error instead of aborting.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeapAllocator;

impl Allocator for HeapAllocator {
    fn alloc(&self, size: usize) -> Result<Vec<u8>, AllocError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(size).map_err(|_| AllocError(size))?;
        buf.resize(size, 0);
        Ok(buf)
    }
}

// Reserves room for `n` elements without aborting on exhaustion.
pub(crate) fn try_with_capacity<T>(n: usize) -> Result<Vec<T>, AllocError> {
    let mut v = Vec::new();
    v.try_reserve_exact(n)
        .map_err(|_| AllocError(n.saturating_mul(std::mem::size_of::<T>())))?;
    Ok(v)
}
