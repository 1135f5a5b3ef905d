/*!
 * tagheap
 *
 * A malloc-style dynamic memory allocator over a single growable arena,
 * with all bookkeeping held in-band: every block carries its size and
 * allocation flag in boundary-tag words at both ends, and free blocks
 * thread the free lists through their own payload bytes.
 *
 * ## Placement policies
 *
 * Two interchangeable free-list stores implement [`PlacementPolicy`]:
 *
 * - [`ExplicitList`]: one doubly-linked list of all free blocks,
 *   first-fit placement, O(1) unlink.
 * - [`SegregatedFit`]: fixed size classes {16..256} with O(1) exact-fit
 *   LIFO lists, falling back to an explicit first-fit list for
 *   everything else.
 *
 * Both share the boundary-tag codec and the split/coalesce engine, so
 * splitting leaves the free remainder in place at the low end of the
 * donor block and freeing merges physical neighbors in O(1).
 *
 * ## Safety model
 *
 * The heap is an owned byte buffer and "pointers" are byte offsets into
 * it; all tag and link accesses are bounds-checked. A stale or fabricated
 * offset can never alias memory outside the arena.
 */

pub mod alloc;
pub mod block;
pub mod check;
pub mod core;
pub mod heap;
pub mod traits;
pub mod types;

// Re-exports
pub use alloc::{
    ExplicitAllocator, ExplicitList, HeapAllocator, PlacementPolicy, SegregatedAllocator,
    SegregatedFit,
};
pub use check::{CheckReport, Finding};
pub use traits::{Allocator, HeapCheck, HeapInspect};
pub use types::{HeapConfig, HeapStats, MemoryError, MemoryResult};
