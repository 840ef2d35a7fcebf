//! Named constants shared across the allocator engine.

/// Block and payload alignment, in bytes.
///
/// Must be a power of two; the header codec in [`crate::header`] relies on
/// it being at least 8 so the low three size bits can be folded into the
/// flag bits instead of being stored twice.
pub const ALIGNMENT: usize = 8;

/// Size of the packed block header, in bytes.
pub const HEADER_SIZE: usize = 8;

/// Smallest possible block size: the header plus room for the free list's
/// intrusive `prev`/`next` pointers.
pub const MIN_BLOCK_SIZE: usize = HEADER_SIZE + 2 * size_of::<*mut u8>();

/// Upper bound on a single `allocate`/`resize` request, in bytes.
///
/// Chosen well below `isize::MAX` so that `requested_bytes + HEADER_SIZE`
/// can never overflow `usize` while rounding up to [`ALIGNMENT`], on any
/// target this crate supports.
pub const MAX_REQUEST_SIZE: usize = 1 << 40;
