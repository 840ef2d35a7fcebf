//! Coalescer: right-only merging of adjacent free blocks.
//!
//! Left-side merging is not performed. The invariant that two adjacent free
//! blocks never coexist is instead upheld by checking the *right* neighbour
//! of every block as it becomes free (on `release`) or as it grows into its
//! neighbours (on `resize`'s grow path) — the same one-sided policy the
//! reference `explicit.c` implementation uses. This does not guard against
//! a block whose *left* neighbour happens to already be free; the validator
//! relaxes its "no adjacent free blocks" check for exactly this reason.

use crate::allocator::Allocator;
use crate::block::next_physical;
use crate::header::Header;

impl Allocator {
    /// `true` if `h` has a physical right neighbour within the segment,
    /// i.e. `h` is not the current tail block.
    pub(crate) fn has_right_neighbour(&self, h: Header) -> bool {
        self.end != Some(h)
    }

    /// Merges `cur` with its physical right neighbour `next`, which must
    /// already be known free. The base/middle/end cases of a right merge
    /// all reduce to "extend `cur`, drop `next`", differing only in
    /// whether `next` was the segment's `end`.
    ///
    /// `next` is unlinked from the free list; `cur`'s list membership is
    /// left to the caller, since whether `cur` itself belongs in the free
    /// list depends on context (a release in progress, or a grow in
    /// progress that may yet be undone).
    pub(crate) fn merge_right(&mut self, cur: Header, next: Header) {
        let used = cur.is_used();
        let next_size = next.size();
        let new_size = cur.size() + next_size;

        if self.end == Some(next) {
            self.end = Some(cur);
        }
        self.unlink(next);
        cur.write(new_size, used);

        if used {
            // `next`'s bytes move from "free, uncounted" to "part of a used
            // block" — keep `used_bytes` in sync with the new size.
            self.used_bytes += next_size;
        }
    }

    /// If `cur`'s right physical neighbour exists and is free, merges it in
    /// and reports whether a merge happened.
    pub(crate) fn coalesce_right_if_free(&mut self, cur: Header) -> bool {
        if !self.has_right_neighbour(cur) {
            return false;
        }
        let next = unsafe { next_physical(cur) };
        if next.is_used() {
            return false;
        }
        self.merge_right(cur, next);
        true
    }
}
