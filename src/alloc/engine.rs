/*!
 * Split/Coalesce Engine
 *
 * Carves a chosen free block into an allocated piece and a free remainder
 * on placement, and merges a freed block with its physical neighbors on
 * release. Works purely through boundary tags and the placement policy's
 * insert/remove hooks; the sentinel blocks terminate both merge
 * directions, so none of these paths has a failure case.
 */

use super::policy::PlacementPolicy;
use crate::block::codec;
use crate::core::limits::{align_up, MIN_BLOCK, SENTINEL, WORD};
use crate::core::types::{Offset, Size};
use crate::heap::Heap;
use crate::types::MemoryResult;
use log::info;

/// Allocate `size` payload bytes out of the free block at `block`,
/// returning the payload offset of the allocated piece.
///
/// When the block is large enough to split, the free remainder keeps the
/// block's original header position: its list links live in the first two
/// payload words, which do not move, so its list membership survives the
/// split untouched. The allocated piece is carved from the tail and never
/// enters any list. When the block cannot be split, it is unlinked and
/// allocated whole.
pub(crate) fn place<P: PlacementPolicy>(
    heap: &mut Heap,
    policy: &mut P,
    block: Offset,
    size: Size,
) -> Offset {
    let (block_size, _) = codec::tag(heap, block);
    if block_size >= size + MIN_BLOCK {
        let remainder = block_size - size - 2 * WORD;
        codec::write_tags(heap, block, remainder, false);
        let tail = codec::next_of(block, remainder);
        codec::write_tags(heap, tail, size, true);
        codec::payload_of(tail)
    } else {
        policy.remove(heap, block);
        codec::set_allocated(heap, block, true);
        codec::payload_of(block)
    }
}

/// Merge the free block at `block` with free physical neighbors and hand
/// the result to the policy. Returns the merged block's offset.
///
/// The backward and forward merges are independent; releasing the middle
/// of three adjacent free-able blocks collapses all three in one call.
/// Merged neighbors are unlinked first and the merged result reinserted,
/// so a policy that routes blocks by size always sees the final size.
pub(crate) fn coalesce<P: PlacementPolicy>(
    heap: &mut Heap,
    policy: &mut P,
    block: Offset,
) -> Offset {
    let (mut size, _) = codec::tag(heap, block);
    let mut merged = block;

    let (prev_size, prev_allocated) = codec::prev_tag(heap, block);
    if !prev_allocated {
        let prev = codec::prev_of(block, prev_size);
        policy.remove(heap, prev);
        size += prev_size + 2 * WORD;
        merged = prev;
    }

    let next = codec::next_of(merged, size);
    let (next_size, next_allocated) = codec::tag(heap, next);
    if !next_allocated {
        policy.remove(heap, next);
        size += next_size + 2 * WORD;
    }

    codec::write_tags(heap, merged, size, false);
    policy.insert(heap, merged);
    merged
}

/// Grow the heap for a placement miss: extend by at least the configured
/// chunk, format the new region as one free block in place of the old
/// epilogue, write a fresh epilogue at the new top, and coalesce the new
/// block with a free predecessor. Returns the resulting free block.
///
/// `requested` is the original caller request, carried into the
/// out-of-memory error when the extension is refused; refusal leaves every
/// existing block untouched.
pub(crate) fn grow<P: PlacementPolicy>(
    heap: &mut Heap,
    policy: &mut P,
    need: Size,
    chunk: Size,
    requested: Size,
) -> MemoryResult<Offset> {
    let grow_by = align_up(chunk.max(need + 2 * WORD));
    let old_top = heap.extend(grow_by, requested)?;

    // the old epilogue header becomes the new block's header
    let block = old_top - SENTINEL;
    let size = grow_by - SENTINEL;
    codec::write_tags(heap, block, size, false);
    codec::write_tags(heap, codec::next_of(block, size), 0, true);
    info!(
        "heap extended by {} bytes for a request of {} (now {} total)",
        grow_by,
        need,
        heap.len()
    );
    Ok(coalesce(heap, policy, block))
}
