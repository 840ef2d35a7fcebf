//! Block walker: steps through the physical sequence of blocks.

use crate::header::Header;

/// Returns the header of the block physically adjacent to `h`, to its
/// right.
///
/// Well-defined only while the result address lies within the managed
/// segment; callers check against the segment's end address (tracked as
/// `Allocator::end`) before treating the result as a real block.
///
/// # Safety
/// `h` must be a valid header inside a segment, and the block immediately
/// to its right must not run past the end of that segment.
#[inline]
pub(crate) unsafe fn next_physical(h: Header) -> Header {
    unsafe { Header::at(h.addr().add(h.size())) }
}
