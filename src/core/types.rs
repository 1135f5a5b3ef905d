/*!
 * Core Types
 * Common scalar types used across the allocator
 */

/// Byte offset into the managed heap region.
///
/// Offsets play the role raw pointers play in a conventional allocator:
/// every block, boundary tag, and free-list link is addressed by its
/// distance from the start of the arena, so growth of the arena's backing
/// storage never invalidates them.
pub type Offset = usize;

/// Size type for payload and region byte counts
pub type Size = usize;

/// Boundary-tag word as stored in the arena (little-endian)
pub type Word = u64;
