/*!
 * Heap Consistency Checker
 *
 * Walks the physical block chain and the policy's free lists and reports
 * every invariant violation it can find. Purely diagnostic: it never
 * mutates the heap, never panics on a corrupt one, and is not part of the
 * allocation hot path. Verbosity 1 logs findings, verbosity 2 adds a
 * per-block trace.
 */

use crate::alloc::PlacementPolicy;
use crate::block::codec;
use crate::core::limits::{ALIGNMENT, FIRST_BLOCK, MIN_BLOCK, MIN_PAYLOAD, SENTINEL, WORD};
use crate::core::types::{Offset, Size, Word};
use crate::heap::Heap;
use log::{debug, warn};
use serde::Serialize;
use std::fmt;

/// A single invariant violation found in the heap
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Finding {
    /// Prologue sentinel words are not a zero-size allocated block
    BadPrologue,
    /// Epilogue sentinel words are wrong, or the block walk missed it
    BadEpilogue,
    /// A block or its footer extends past the end of the heap
    OutOfBounds { block: Offset },
    /// Payload size is below the minimum or not 8-aligned
    BadSize { block: Offset, size: Size },
    /// Header and footer of a block disagree
    TagMismatch {
        block: Offset,
        header: Word,
        footer: Word,
    },
    /// Two physically adjacent blocks are both free
    AdjacentFree { block: Offset },
    /// A free-list link does not hold (asymmetry, cycle, bad head)
    BrokenLink { block: Offset, detail: String },
    /// A block on a size-class list has the wrong payload size
    ClassSizeMismatch {
        class: Size,
        block: Offset,
        size: Size,
    },
    /// A block reachable from a free list is marked allocated
    ListedNotFree { block: Offset },
    /// Linear scan and list traversal disagree on the free-block count
    CountMismatch { by_scan: usize, by_list: usize },
    /// The block walk gave up (more blocks than the heap could hold)
    TruncatedWalk { at: Offset },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::BadPrologue => write!(f, "bad prologue sentinel"),
            Finding::BadEpilogue => write!(f, "bad or missing epilogue sentinel"),
            Finding::OutOfBounds { block } => {
                write!(f, "block 0x{block:x} runs past the end of the heap")
            }
            Finding::BadSize { block, size } => {
                write!(f, "block 0x{block:x} has illegal payload size {size}")
            }
            Finding::TagMismatch {
                block,
                header,
                footer,
            } => write!(
                f,
                "block 0x{block:x}: header {header:#x} != footer {footer:#x}"
            ),
            Finding::AdjacentFree { block } => write!(
                f,
                "block 0x{block:x} and its predecessor are both free (missed coalesce)"
            ),
            Finding::BrokenLink { block, detail } => {
                write!(f, "free-list link broken at 0x{block:x}: {detail}")
            }
            Finding::ClassSizeMismatch { class, block, size } => write!(
                f,
                "class {class} list holds block 0x{block:x} of size {size}"
            ),
            Finding::ListedNotFree { block } => {
                write!(f, "allocated block 0x{block:x} reachable from a free list")
            }
            Finding::CountMismatch { by_scan, by_list } => write!(
                f,
                "free blocks lost: scan found {by_scan}, lists hold {by_list}"
            ),
            Finding::TruncatedWalk { at } => {
                write!(f, "block walk truncated at 0x{at:x}")
            }
        }
    }
}

/// Result of one checker run
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    pub findings: Vec<Finding>,
    /// Non-sentinel blocks visited by the linear walk
    pub blocks: usize,
    /// Free blocks seen by the linear walk
    pub free_by_scan: usize,
    /// Free blocks reachable from the policy's list heads
    pub free_by_list: usize,
}

impl CheckReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Check every structural invariant of the heap and its free lists
pub fn check_heap<P: PlacementPolicy>(heap: &Heap, policy: &P, verbosity: u8) -> CheckReport {
    let mut report = CheckReport::new();
    let sentinel = codec::encode(0, true);

    if heap.checked_word(0) != Some(sentinel) || heap.checked_word(WORD) != Some(sentinel) {
        report.push(Finding::BadPrologue);
    }
    if heap.len() < 2 * SENTINEL {
        report.push(Finding::BadEpilogue);
        return finish(report, policy.name(), verbosity);
    }
    let epilogue = heap.len() - SENTINEL;

    let mut at = FIRST_BLOCK;
    let mut prev_free = false;
    let mut remaining = heap.len() / MIN_BLOCK + 1;
    while at < epilogue {
        if remaining == 0 {
            report.push(Finding::TruncatedWalk { at });
            break;
        }
        remaining -= 1;

        let Some(header) = heap.checked_word(at) else {
            report.push(Finding::OutOfBounds { block: at });
            break;
        };
        let (size, allocated) = codec::decode(header);
        if verbosity >= 2 {
            debug!(
                "block 0x{:x}: {} payload bytes, {}",
                at,
                size,
                if allocated { "allocated" } else { "free" }
            );
        }
        // geometry past a mangled size word is meaningless, stop the walk
        if size < MIN_PAYLOAD || size % ALIGNMENT != 0 {
            report.push(Finding::BadSize { block: at, size });
            break;
        }
        match heap.checked_word(codec::footer_of(at, size)) {
            Some(footer) if footer == header => {}
            Some(footer) => report.push(Finding::TagMismatch {
                block: at,
                header,
                footer,
            }),
            None => {
                report.push(Finding::OutOfBounds { block: at });
                break;
            }
        }
        if !allocated {
            report.free_by_scan += 1;
            if prev_free {
                report.push(Finding::AdjacentFree { block: at });
            }
        }
        prev_free = !allocated;
        report.blocks += 1;
        at = codec::next_of(at, size);
    }
    if at > epilogue {
        report.push(Finding::BadEpilogue);
    }
    if heap.checked_word(epilogue) != Some(sentinel)
        || heap.checked_word(epilogue + WORD) != Some(sentinel)
    {
        report.push(Finding::BadEpilogue);
    }

    let listed = policy.free_blocks(heap);
    report.free_by_list = listed.len();
    for &block in &listed {
        if !heap.contains(block, MIN_BLOCK) {
            report.push(Finding::OutOfBounds { block });
            continue;
        }
        let (_, allocated) = codec::tag(heap, block);
        if allocated {
            report.push(Finding::ListedNotFree { block });
        }
    }
    policy.audit(heap, &mut report);

    if report.free_by_scan != report.free_by_list {
        let (by_scan, by_list) = (report.free_by_scan, report.free_by_list);
        report.push(Finding::CountMismatch { by_scan, by_list });
    }

    finish(report, policy.name(), verbosity)
}

fn finish(report: CheckReport, policy: &str, verbosity: u8) -> CheckReport {
    if verbosity >= 1 {
        for finding in &report.findings {
            warn!("checkheap[{policy}]: {finding}");
        }
        if report.is_clean() {
            debug!(
                "checkheap[{}]: clean ({} blocks, {} free)",
                policy, report.blocks, report.free_by_scan
            );
        }
    }
    report
}
