/*!
 * Placement Policy
 * Free-list store abstraction shared by the allocator facade and engine
 */

use crate::check::CheckReport;
use crate::core::limits::MIN_BLOCK;
use crate::core::types::{Offset, Size};
use crate::heap::Heap;

/// A free-list store plus its placement rule.
///
/// The policy owns the out-of-band list heads; the lists themselves are
/// threaded through the payload words of the free blocks. The engine
/// drives the store through three mutations (`insert`, `remove`, and the
/// implicit in-place resize of a split remainder, which needs no call) and
/// one query (`find_fit`).
pub trait PlacementPolicy {
    /// Short policy name for logs and diagnostics
    fn name(&self) -> &'static str;

    /// Round a caller request up to the payload size this policy allocates
    /// for it. Always 8-aligned and at least the minimum payload.
    fn request_size(&self, requested: Size) -> Size;

    /// Find a free block with payload >= `size`, without unlinking it
    fn find_fit(&self, heap: &Heap, size: Size) -> Option<Offset>;

    /// Add a free block to the store. The block's tags must already be
    /// written and marked free; its link words are overwritten here.
    fn insert(&mut self, heap: &mut Heap, block: Offset);

    /// Unlink a block currently held by the store
    fn remove(&mut self, heap: &mut Heap, block: Offset);

    /// Every block reachable from the store's list heads, for the checker
    fn free_blocks(&self, heap: &Heap) -> Vec<Offset>;

    /// Policy-specific structural checks (link symmetry, class sizing)
    fn audit(&self, heap: &Heap, report: &mut CheckReport);
}

/// Upper bound on list traversal steps: more nodes than could physically
/// fit in the heap means a cycle, and traversals stop rather than hang.
#[inline]
pub(crate) fn traversal_bound(heap: &Heap) -> usize {
    heap.len() / MIN_BLOCK + 1
}
