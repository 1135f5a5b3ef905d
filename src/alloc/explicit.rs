/*!
 * Explicit Free List
 *
 * One doubly-linked list of every free block, threaded through the first
 * two payload words of the blocks themselves. Insertion is LIFO at the
 * head; placement is first-fit from the head; unlinking is O(1) through
 * the in-band prev/next links. The head's prev link is always nil.
 */

use super::policy::{traversal_bound, PlacementPolicy};
use crate::block::codec::{self, LINK_NEXT, LINK_PREV};
use crate::check::{CheckReport, Finding};
use crate::core::limits::{align_up, MIN_BLOCK, MIN_PAYLOAD, NIL};
use crate::core::types::{Offset, Size};
use crate::heap::Heap;
use log::error;

/// Intrusive doubly-linked explicit free list
#[derive(Debug, Default, Clone)]
pub struct ExplicitList {
    head: Offset,
}

impl ExplicitList {
    pub fn new() -> Self {
        Self { head: NIL }
    }

    /// Head block offset, [`NIL`] when the list is empty
    #[inline]
    pub fn head(&self) -> Offset {
        self.head
    }
}

impl PlacementPolicy for ExplicitList {
    fn name(&self) -> &'static str {
        "explicit"
    }

    fn request_size(&self, requested: Size) -> Size {
        align_up(requested.max(MIN_PAYLOAD))
    }

    fn find_fit(&self, heap: &Heap, size: Size) -> Option<Offset> {
        let mut cursor = self.head;
        let mut remaining = traversal_bound(heap);
        while cursor != NIL && remaining > 0 {
            let (block_size, allocated) = codec::tag(heap, cursor);
            if allocated {
                error!("allocated block 0x{cursor:x} found on the free list");
            } else if block_size >= size {
                return Some(cursor);
            }
            cursor = codec::link(heap, cursor, LINK_NEXT);
            remaining -= 1;
        }
        None
    }

    fn insert(&mut self, heap: &mut Heap, block: Offset) {
        codec::set_link(heap, block, LINK_PREV, NIL);
        codec::set_link(heap, block, LINK_NEXT, self.head);
        if self.head != NIL {
            codec::set_link(heap, self.head, LINK_PREV, block);
        }
        self.head = block;
    }

    fn remove(&mut self, heap: &mut Heap, block: Offset) {
        let prev = codec::link(heap, block, LINK_PREV);
        let next = codec::link(heap, block, LINK_NEXT);
        if prev == NIL {
            self.head = next;
        } else {
            codec::set_link(heap, prev, LINK_NEXT, next);
        }
        if next != NIL {
            codec::set_link(heap, next, LINK_PREV, prev);
        }
    }

    fn free_blocks(&self, heap: &Heap) -> Vec<Offset> {
        let mut blocks = Vec::new();
        let mut cursor = self.head;
        let mut remaining = traversal_bound(heap);
        while cursor != NIL && remaining > 0 {
            blocks.push(cursor);
            // a link pointing outside the heap ends the walk; the caller's
            // scan/list comparison surfaces the damage
            if !heap.contains(cursor, MIN_BLOCK) {
                break;
            }
            cursor = codec::link(heap, cursor, LINK_NEXT);
            remaining -= 1;
        }
        blocks
    }

    fn audit(&self, heap: &Heap, report: &mut CheckReport) {
        if self.head != NIL
            && heap.contains(self.head, MIN_BLOCK)
            && codec::link(heap, self.head, LINK_PREV) != NIL
        {
            report.push(Finding::BrokenLink {
                block: self.head,
                detail: "list head has a non-nil prev link".into(),
            });
        }
        let mut cursor = self.head;
        let mut remaining = traversal_bound(heap);
        while cursor != NIL {
            if remaining == 0 {
                report.push(Finding::BrokenLink {
                    block: cursor,
                    detail: "free list does not terminate (cycle?)".into(),
                });
                return;
            }
            if !heap.contains(cursor, MIN_BLOCK) {
                report.push(Finding::BrokenLink {
                    block: cursor,
                    detail: "link points outside the heap".into(),
                });
                return;
            }
            let next = codec::link(heap, cursor, LINK_NEXT);
            // checking only next->prev covers both directions once every
            // node is visited
            if next != NIL
                && heap.contains(next, MIN_BLOCK)
                && codec::link(heap, next, LINK_PREV) != cursor
            {
                report.push(Finding::BrokenLink {
                    block: cursor,
                    detail: format!("next block 0x{next:x} does not link back"),
                });
            }
            cursor = next;
            remaining -= 1;
        }
    }
}
