/*!
 * Boundary-Tag Codec
 *
 * Encoding of a block's `(size, allocated)` pair into the single word
 * duplicated at both ends of the block, and the offset arithmetic that
 * ties a block's header, payload, footer, and neighbors together.
 *
 * Bit layout of a tag word: bit 0 is the allocated flag, bits 1..63 carry
 * the payload size. Sizes are always 8-aligned before encoding; the codec
 * does not re-check that, a misaligned size corrupts the block and is only
 * caught later by the heap checker.
 *
 * Block geometry, with `b` the offset of the header word and `size` the
 * payload size:
 *
 * ```text
 *   b          b+8              b+8+size     b+16+size
 *   [ header ][ payload ...... ][ footer ]   <- next block's header
 * ```
 *
 * While a block is free, the first two payload words double as intrusive
 * free-list link slots.
 */

use crate::core::limits::WORD;
use crate::core::types::{Offset, Size, Word};
use crate::heap::Heap;

/// Link slot holding the previous-node offset of a doubly-linked list.
/// Singly-linked class lists reuse this slot for their forward link.
pub const LINK_PREV: usize = 0;

/// Link slot holding the next-node offset of a doubly-linked list
pub const LINK_NEXT: usize = 1;

/// Pack a payload size and allocated flag into one tag word
#[inline]
pub const fn encode(size: Size, allocated: bool) -> Word {
    ((size as Word) << 1) | allocated as Word
}

/// Unpack a tag word into `(size, allocated)`
#[inline]
pub const fn decode(word: Word) -> (Size, bool) {
    ((word >> 1) as Size, word & 1 == 1)
}

/// Payload offset of the block headed at `block`
#[inline]
pub const fn payload_of(block: Offset) -> Offset {
    block + WORD
}

/// Header offset of the block whose payload starts at `payload`
#[inline]
pub const fn block_of(payload: Offset) -> Offset {
    payload - WORD
}

/// Footer offset of a block of the given payload size
#[inline]
pub const fn footer_of(block: Offset, size: Size) -> Offset {
    block + WORD + size
}

/// Header offset of the physically next block
#[inline]
pub const fn next_of(block: Offset, size: Size) -> Offset {
    block + 2 * WORD + size
}

/// Decode the header tag of the block at `block`
#[inline]
pub fn tag(heap: &Heap, block: Offset) -> (Size, bool) {
    decode(heap.word(block))
}

/// Decode the footer tag of the block at `block`
#[inline]
pub fn footer_tag(heap: &Heap, block: Offset) -> (Size, bool) {
    let (size, _) = tag(heap, block);
    decode(heap.word(footer_of(block, size)))
}

/// Payload size of the block at `block`
#[inline]
pub fn size_of(heap: &Heap, block: Offset) -> Size {
    tag(heap, block).0
}

/// Write matching header and footer tags for a block
#[inline]
pub fn write_tags(heap: &mut Heap, block: Offset, size: Size, allocated: bool) {
    let word = encode(size, allocated);
    heap.set_word(block, word);
    heap.set_word(footer_of(block, size), word);
}

/// Flip the allocated flag on both tags, leaving the size untouched
#[inline]
pub fn set_allocated(heap: &mut Heap, block: Offset, allocated: bool) {
    let (size, _) = tag(heap, block);
    write_tags(heap, block, size, allocated);
}

/// Decode the footer of the physically preceding block. Always readable:
/// the word before any real block's header is either the prologue footer
/// or a neighbor's footer.
#[inline]
pub fn prev_tag(heap: &Heap, block: Offset) -> (Size, bool) {
    decode(heap.word(block - WORD))
}

/// Header offset of the physically preceding block of payload size `prev_size`
#[inline]
pub const fn prev_of(block: Offset, prev_size: Size) -> Offset {
    block - 2 * WORD - prev_size
}

/// Read an in-band free-list link of a free block
#[inline]
pub fn link(heap: &Heap, block: Offset, slot: usize) -> Offset {
    heap.word(payload_of(block) + slot * WORD) as Offset
}

/// Write an in-band free-list link of a free block
#[inline]
pub fn set_link(heap: &mut Heap, block: Offset, slot: usize, target: Offset) {
    heap.set_word(payload_of(block) + slot * WORD, target as Word);
}
