//! Finder: first-fit search over the free list.
//!
//! Earlier drafts of this engine considered best-fit (scan the whole list,
//! keep the smallest adequate block); the design settled on first-fit,
//! returning as soon as an adequate block turns up, trading a little
//! fragmentation for an O(1) average search on a typically short list.

use crate::allocator::Allocator;
use crate::header::Header;

impl Allocator {
    /// Returns the first free block whose size is at least `required`, or
    /// `None` if no free block is large enough.
    pub(crate) fn find_fit(&self, required: usize) -> Option<Header> {
        self.free_list_iter().find(|h| h.size() >= required)
    }
}
