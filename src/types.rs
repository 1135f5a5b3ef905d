/*!
 * Allocator Types
 * Errors, configuration, and statistics for the heap allocator
 */

use crate::core::limits::{DEFAULT_GROWTH_CHUNK, DEFAULT_HEAP_LIMIT, DEFAULT_INITIAL_HEAP};
use crate::core::types::{Offset, Size};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Allocator operation result
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Allocator errors.
///
/// `OutOfMemory` is the only error a correct caller ever has to handle:
/// it is the allocation-path "null return". The remaining variants cover
/// the query surface (`payload`, `block_size`); misuse of `release` is
/// tolerated silently per the allocator contract and never errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("out of memory: requested {requested} bytes, growth of {additional} bytes refused ({committed} committed / {limit} limit)")]
    OutOfMemory {
        requested: Size,
        additional: Size,
        committed: Size,
        limit: Size,
    },

    #[error("allocation size overflow: {count} * {size} exceeds usize")]
    SizeOverflow { count: Size, size: Size },

    #[error("invalid pointer: offset 0x{offset:x} is not a live allocation")]
    InvalidPointer { offset: Offset },
}

/// Heap sizing configuration.
///
/// `limit` caps total heap growth; a growth request that would push the
/// region past it fails with [`MemoryError::OutOfMemory`], which is how
/// the underlying extender models `sbrk` refusing to extend the segment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HeapConfig {
    pub initial_size: Size,
    pub growth_chunk: Size,
    pub limit: Size,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            initial_size: DEFAULT_INITIAL_HEAP,
            growth_chunk: DEFAULT_GROWTH_CHUNK,
            limit: DEFAULT_HEAP_LIMIT,
        }
    }
}

impl HeapConfig {
    /// Config sized for tests: a small initial region with a tight ceiling
    pub fn small(initial_size: Size, limit: Size) -> Self {
        Self {
            initial_size,
            growth_chunk: initial_size,
            limit,
        }
    }
}

/// Point-in-time heap statistics, gathered by a linear block walk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeapStats {
    /// Current total size of the managed region, sentinels included
    pub heap_bytes: Size,
    /// Growth ceiling
    pub limit: Size,
    /// Live (allocated, non-sentinel) blocks
    pub allocated_blocks: usize,
    /// Payload bytes in live blocks
    pub allocated_bytes: Size,
    /// Free blocks
    pub free_blocks: usize,
    /// Payload bytes in free blocks
    pub free_bytes: Size,
    /// Cumulative successful allocations
    pub alloc_count: u64,
    /// Cumulative releases (ignored releases excluded)
    pub release_count: u64,
    /// Cumulative heap growth calls
    pub growth_count: u64,
}

impl HeapStats {
    /// Fraction of non-sentinel heap payload currently allocated
    pub fn utilization(&self) -> f64 {
        let usable = self.allocated_bytes + self.free_bytes;
        if usable == 0 {
            return 0.0;
        }
        self.allocated_bytes as f64 / usable as f64
    }
}
