/*!
 * Heap Arena
 *
 * The single managed memory region, held as one owned byte buffer.
 * All bookkeeping (boundary tags, free-list links) lives in-band inside
 * this buffer; the allocator addresses it exclusively through byte
 * offsets, so growing the buffer never invalidates outstanding blocks.
 *
 * Growth is the `sbrk` analogue: the region extends in place and the new
 * top is reported back, or the extension is refused once the configured
 * ceiling would be crossed.
 */

use crate::core::limits::WORD;
use crate::core::types::{Offset, Size, Word};
use crate::types::{MemoryError, MemoryResult};
use log::{debug, error};

/// Growable contiguous memory region with bounds-checked word access
#[derive(Debug)]
pub struct Heap {
    bytes: Vec<u8>,
    limit: Size,
}

impl Heap {
    /// Create a region of `initial` bytes, zero-filled, growable up to `limit`
    pub fn with_limit(initial: Size, limit: Size) -> MemoryResult<Self> {
        if initial > limit {
            error!(
                "initial region of {} bytes exceeds heap limit of {} bytes",
                initial, limit
            );
            return Err(MemoryError::OutOfMemory {
                requested: initial,
                additional: initial,
                committed: 0,
                limit,
            });
        }
        Ok(Self {
            bytes: vec![0u8; initial],
            limit,
        })
    }

    /// Current size of the region in bytes
    #[inline]
    pub fn len(&self) -> Size {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Growth ceiling in bytes
    #[inline]
    pub fn limit(&self) -> Size {
        self.limit
    }

    /// Extend the region by `additional` bytes and return the old top,
    /// i.e. the offset where the new memory starts.
    ///
    /// `requested` is the payload request that triggered the growth; it is
    /// carried into the error for context when the extension is refused.
    /// On refusal the region is left untouched.
    pub fn extend(&mut self, additional: Size, requested: Size) -> MemoryResult<Offset> {
        let old_top = self.bytes.len();
        if old_top + additional > self.limit {
            error!(
                "heap growth refused: {} + {} bytes would exceed limit of {}",
                old_top, additional, self.limit
            );
            return Err(MemoryError::OutOfMemory {
                requested,
                additional,
                committed: old_top,
                limit: self.limit,
            });
        }
        self.bytes.resize(old_top + additional, 0);
        debug!(
            "heap grown by {} bytes to {} total",
            additional,
            self.bytes.len()
        );
        Ok(old_top)
    }

    /// Read the boundary-tag word at `at`
    #[inline]
    pub fn word(&self, at: Offset) -> Word {
        let mut raw = [0u8; WORD];
        raw.copy_from_slice(&self.bytes[at..at + WORD]);
        Word::from_le_bytes(raw)
    }

    /// Write the boundary-tag word at `at`
    #[inline]
    pub fn set_word(&mut self, at: Offset, value: Word) {
        self.bytes[at..at + WORD].copy_from_slice(&value.to_le_bytes());
    }

    /// Bounds-tolerant word read for diagnostics; `None` past the end.
    /// The checker walks heaps that may be corrupt, so it must never trip
    /// the panicking accessors.
    #[inline]
    pub fn checked_word(&self, at: Offset) -> Option<Word> {
        let end = at.checked_add(WORD)?;
        if end > self.bytes.len() {
            return None;
        }
        Some(self.word(at))
    }

    /// Whether `at..at + len` lies inside the region
    #[inline]
    pub fn contains(&self, at: Offset, len: Size) -> bool {
        at.checked_add(len).is_some_and(|end| end <= self.bytes.len())
    }

    /// Borrow `len` bytes starting at `start`
    #[inline]
    pub fn slice(&self, start: Offset, len: Size) -> &[u8] {
        &self.bytes[start..start + len]
    }

    /// Mutably borrow `len` bytes starting at `start`
    #[inline]
    pub fn slice_mut(&mut self, start: Offset, len: Size) -> &mut [u8] {
        &mut self.bytes[start..start + len]
    }

    /// Copy `len` bytes from `src` to `dst` within the region
    #[inline]
    pub fn copy(&mut self, src: Offset, dst: Offset, len: Size) {
        self.bytes.copy_within(src..src + len, dst);
    }

    /// Zero `len` bytes starting at `start`
    #[inline]
    pub fn fill_zero(&mut self, start: Offset, len: Size) {
        self.bytes[start..start + len].fill(0);
    }
}
