/*!
 * Allocator Facade
 *
 * Composes the heap arena, the boundary-tag codec, a placement policy,
 * and the split/coalesce engine into the `malloc`/`free`/`realloc`/
 * `calloc` surface. One facade instance owns one heap; all operations
 * take `&mut self` and the whole structure is single-threaded by
 * contract. A concurrent host must serialize calls behind its own lock.
 */

mod engine;
mod explicit;
mod policy;
mod segregated;

pub use explicit::ExplicitList;
pub use policy::PlacementPolicy;
pub use segregated::SegregatedFit;

use crate::block::codec;
use crate::check::{self, CheckReport};
use crate::core::limits::{
    align_up, ALIGNMENT, FIRST_BLOCK, MIN_GROWTH_CHUNK, MIN_INITIAL_HEAP, MIN_PAYLOAD, SENTINEL,
    WORD,
};
use crate::core::types::{Offset, Size};
use crate::heap::Heap;
use crate::traits::{Allocator, HeapCheck, HeapInspect};
use crate::types::{HeapConfig, HeapStats, MemoryError, MemoryResult};
use log::{debug, error, info, warn};

/// Allocator over the intrusive explicit free list
pub type ExplicitAllocator = HeapAllocator<ExplicitList>;

/// Allocator over segregated size classes with explicit-list fallback
pub type SegregatedAllocator = HeapAllocator<SegregatedFit>;

#[derive(Debug, Default)]
struct Counters {
    allocs: u64,
    releases: u64,
    growths: u64,
}

/// Heap allocator facade, generic over the placement policy
#[derive(Debug)]
pub struct HeapAllocator<P: PlacementPolicy> {
    heap: Heap,
    policy: P,
    config: HeapConfig,
    counters: Counters,
}

impl<P: PlacementPolicy + Default> HeapAllocator<P> {
    /// Initialize an allocator with the default sizing
    pub fn new() -> MemoryResult<Self> {
        Self::with_config(HeapConfig::default())
    }

    /// Initialize an allocator with custom sizing
    pub fn with_config(config: HeapConfig) -> MemoryResult<Self> {
        Self::with_policy(P::default(), config)
    }
}

impl<P: PlacementPolicy> HeapAllocator<P> {
    /// Initialize the heap: prologue sentinel, one free block spanning the
    /// rest of the initial region, epilogue sentinel.
    ///
    /// Fails with `OutOfMemory` when the initial region itself does not
    /// fit under the configured limit.
    pub fn with_policy(mut policy: P, config: HeapConfig) -> MemoryResult<Self> {
        let initial = align_up(config.initial_size.max(MIN_INITIAL_HEAP));
        let config = HeapConfig {
            initial_size: initial,
            growth_chunk: align_up(config.growth_chunk.max(MIN_GROWTH_CHUNK)),
            limit: config.limit,
        };
        let mut heap = Heap::with_limit(initial, config.limit)?;

        codec::write_tags(&mut heap, 0, 0, true);
        let seed = initial - 3 * SENTINEL;
        codec::write_tags(&mut heap, FIRST_BLOCK, seed, false);
        codec::write_tags(&mut heap, codec::next_of(FIRST_BLOCK, seed), 0, true);
        policy.insert(&mut heap, FIRST_BLOCK);

        info!(
            "{} allocator initialized: {} byte region, limit {}",
            policy.name(),
            initial,
            config.limit
        );
        Ok(Self {
            heap,
            policy,
            config,
            counters: Counters::default(),
        })
    }

    /// Allocate `size` payload bytes and return the payload offset.
    ///
    /// A zero `size` is legal and yields a minimum-size block that can be
    /// written up to its rounded payload size and released normally.
    /// `OutOfMemory` is the only failure.
    pub fn alloc(&mut self, size: Size) -> MemoryResult<Offset> {
        let need = self.policy.request_size(size);
        let block = match self.policy.find_fit(&self.heap, need) {
            Some(block) => block,
            None => {
                engine::grow(
                    &mut self.heap,
                    &mut self.policy,
                    need,
                    self.config.growth_chunk,
                    size,
                )?;
                self.counters.growths += 1;
                // retry placement exactly once
                self.policy.find_fit(&self.heap, need).ok_or_else(|| {
                    error!("heap grew but placement retry failed for {need} bytes");
                    MemoryError::OutOfMemory {
                        requested: size,
                        additional: 0,
                        committed: self.heap.len(),
                        limit: self.heap.limit(),
                    }
                })?
            }
        };
        let payload = engine::place(&mut self.heap, &mut self.policy, block, need);
        self.counters.allocs += 1;
        debug!("allocated {} payload bytes at 0x{:x}", need, payload);
        Ok(payload)
    }

    /// Release the allocation whose payload starts at `ptr`.
    ///
    /// Never errors: `None`, offsets outside the heap, misaligned offsets,
    /// and targets that are not live allocations are ignored with a log
    /// line, per the `free` contract.
    pub fn release(&mut self, ptr: Option<Offset>) {
        let Some(payload) = ptr else { return };
        let Some((block, size)) = self.live_block(payload) else {
            warn!("ignoring release of invalid pointer 0x{payload:x}");
            return;
        };
        codec::set_allocated(&mut self.heap, block, false);
        engine::coalesce(&mut self.heap, &mut self.policy, block);
        self.counters.releases += 1;
        debug!("released {} payload bytes at 0x{:x}", size, payload);
    }

    /// Resize an allocation, preserving the first `min(old, new)` payload
    /// bytes. `None` acts as a plain `alloc`; a zero `size` releases the
    /// target and returns `Ok(None)`. The data is always moved to a fresh
    /// block; in-place growth is deliberately not attempted.
    pub fn reallocate(
        &mut self,
        ptr: Option<Offset>,
        size: Size,
    ) -> MemoryResult<Option<Offset>> {
        let Some(payload) = ptr else {
            return self.alloc(size).map(Some);
        };
        if size == 0 {
            self.release(Some(payload));
            return Ok(None);
        }
        let Some((_, old_size)) = self.live_block(payload) else {
            warn!("reallocate target 0x{payload:x} is not a live allocation, allocating fresh");
            return self.alloc(size).map(Some);
        };
        let fresh = self.alloc(size)?;
        self.heap.copy(payload, fresh, old_size.min(size));
        self.release(Some(payload));
        Ok(Some(fresh))
    }

    /// Allocate `count * size` bytes with the whole payload zero-filled
    pub fn alloc_zeroed(&mut self, count: Size, size: Size) -> MemoryResult<Offset> {
        let bytes = count
            .checked_mul(size)
            .ok_or(MemoryError::SizeOverflow { count, size })?;
        let payload = self.alloc(bytes)?;
        let block_size = codec::size_of(&self.heap, codec::block_of(payload));
        self.heap.fill_zero(payload, block_size);
        Ok(payload)
    }

    /// Borrow the payload bytes of a live allocation
    pub fn payload(&self, ptr: Offset) -> MemoryResult<&[u8]> {
        let (_, size) = self
            .live_block(ptr)
            .ok_or(MemoryError::InvalidPointer { offset: ptr })?;
        Ok(self.heap.slice(ptr, size))
    }

    /// Mutably borrow the payload bytes of a live allocation
    pub fn payload_mut(&mut self, ptr: Offset) -> MemoryResult<&mut [u8]> {
        let (_, size) = self
            .live_block(ptr)
            .ok_or(MemoryError::InvalidPointer { offset: ptr })?;
        Ok(self.heap.slice_mut(ptr, size))
    }

    /// Payload size of a live allocation, `None` otherwise
    pub fn block_size(&self, ptr: Offset) -> Option<Size> {
        self.live_block(ptr).map(|(_, size)| size)
    }

    /// Gather statistics by one linear walk over the block chain
    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats {
            heap_bytes: self.heap.len(),
            limit: self.heap.limit(),
            allocated_blocks: 0,
            allocated_bytes: 0,
            free_blocks: 0,
            free_bytes: 0,
            alloc_count: self.counters.allocs,
            release_count: self.counters.releases,
            growth_count: self.counters.growths,
        };
        let epilogue = self.heap.len() - SENTINEL;
        let mut at = FIRST_BLOCK;
        while at < epilogue {
            let (size, allocated) = codec::tag(&self.heap, at);
            if allocated {
                stats.allocated_blocks += 1;
                stats.allocated_bytes += size;
            } else {
                stats.free_blocks += 1;
                stats.free_bytes += size;
            }
            at = codec::next_of(at, size);
        }
        stats
    }

    /// Memory info as `(total, used, available)` bytes
    pub fn info(&self) -> (Size, Size, Size) {
        let stats = self.stats();
        (stats.heap_bytes, stats.allocated_bytes, stats.free_bytes)
    }

    /// Run the consistency checker; diagnostic only, never mutates
    pub fn check_heap(&self, verbosity: u8) -> CheckReport {
        check::check_heap(&self.heap, &self.policy, verbosity)
    }

    /// The active placement policy
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Normalized sizing configuration
    pub fn config(&self) -> HeapConfig {
        self.config
    }

    /// Validate that `payload` addresses a live allocation and return its
    /// block offset and payload size. Rejects anything that could not
    /// have been returned by `alloc`: out-of-range and misaligned offsets,
    /// free blocks, and offsets whose tags do not line up.
    fn live_block(&self, payload: Offset) -> Option<(Offset, Size)> {
        if payload < FIRST_BLOCK + WORD || payload % ALIGNMENT != 0 {
            return None;
        }
        let block = codec::block_of(payload);
        let header = self.heap.checked_word(block)?;
        let (size, allocated) = codec::decode(header);
        if !allocated || size < MIN_PAYLOAD || size % ALIGNMENT != 0 {
            return None;
        }
        let end = block.checked_add(2 * WORD)?.checked_add(size)?;
        if end > self.heap.len() - SENTINEL {
            return None;
        }
        if self.heap.word(codec::footer_of(block, size)) != header {
            return None;
        }
        Some((block, size))
    }
}

impl<P: PlacementPolicy> Allocator for HeapAllocator<P> {
    fn alloc(&mut self, size: Size) -> MemoryResult<Offset> {
        HeapAllocator::alloc(self, size)
    }

    fn release(&mut self, ptr: Option<Offset>) {
        HeapAllocator::release(self, ptr)
    }

    fn reallocate(&mut self, ptr: Option<Offset>, size: Size) -> MemoryResult<Option<Offset>> {
        HeapAllocator::reallocate(self, ptr, size)
    }

    fn alloc_zeroed(&mut self, count: Size, size: Size) -> MemoryResult<Offset> {
        HeapAllocator::alloc_zeroed(self, count, size)
    }
}

impl<P: PlacementPolicy> HeapInspect for HeapAllocator<P> {
    fn stats(&self) -> HeapStats {
        HeapAllocator::stats(self)
    }

    fn info(&self) -> (Size, Size, Size) {
        HeapAllocator::info(self)
    }

    fn block_size(&self, ptr: Offset) -> Option<Size> {
        HeapAllocator::block_size(self, ptr)
    }
}

impl<P: PlacementPolicy> HeapCheck for HeapAllocator<P> {
    fn check_heap(&self, verbosity: u8) -> CheckReport {
        HeapAllocator::check_heap(self, verbosity)
    }
}
