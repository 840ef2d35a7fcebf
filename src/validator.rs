//! Validator: an invariant-checking routine meant for tests and debug
//! builds, not the allocation hot path.

use crate::allocator::Allocator;
use crate::block::next_physical;
use crate::config::{ALIGNMENT, HEADER_SIZE, MIN_BLOCK_SIZE};
use crate::header::Header;

impl Allocator {
    /// Walks the physical block chain and checks the structural invariants:
    /// every block is aligned and at least `MIN_BLOCK_SIZE`, block sizes sum
    /// to the segment size, `used_bytes` matches the sum of allocated
    /// payload sizes, `end` names the last physical block, and the free
    /// list's length matches the number of physically free blocks.
    ///
    /// Deliberately not checked: that no two physically adjacent blocks are
    /// both free. This allocator's right-only coalescing policy does not
    /// guarantee that in general — a block released next to an
    /// already-free left neighbour is a known, accepted gap in one-sided
    /// coalescing, and this check is relaxed to allow for it.
    #[must_use]
    pub fn validate(&self) -> bool {
        if self.segment_start.is_null() {
            return false;
        }

        let segment_end = unsafe { self.segment_start.add(self.segment_size) };
        let mut cur = unsafe { Header::at(self.segment_start) };
        let mut total_size = 0usize;
        let mut free_count = 0usize;
        let mut used_accounted = 0usize;
        let mut last = cur;

        loop {
            let size = cur.size();
            if size % ALIGNMENT != 0 || size < MIN_BLOCK_SIZE {
                return false;
            }

            total_size += size;
            if cur.is_used() {
                used_accounted += size - HEADER_SIZE;
            } else {
                free_count += 1;
            }
            last = cur;

            let next = unsafe { next_physical(cur) };
            match (next.addr() as usize).cmp(&(segment_end as usize)) {
                core::cmp::Ordering::Equal => break,
                core::cmp::Ordering::Greater => return false,
                core::cmp::Ordering::Less => cur = next,
            }
        }

        total_size == self.segment_size
            && used_accounted == self.used_bytes
            && Some(last) == self.end
            && self.base.is_none() == (free_count == 0)
            && free_count == self.free_list_iter().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_segment(size: usize) -> (Allocator, Vec<u8>) {
        let mut alloc = Allocator::new();
        let mut buf = vec![0u8; size];
        unsafe {
            assert!(alloc.init(buf.as_mut_ptr(), size));
        }
        (alloc, buf)
    }

    #[test]
    fn fresh_allocator_fails_validation() {
        let alloc = Allocator::new();
        assert!(!alloc.validate());
    }

    #[test]
    fn freshly_initialized_segment_validates() {
        let (alloc, _buf) = new_segment(256);
        assert!(alloc.validate());
    }

    #[test]
    fn validates_after_allocate_release_cycles() {
        let (mut alloc, _buf) = new_segment(512);
        let a = alloc.allocate(32).unwrap();
        let b = alloc.allocate(64).unwrap();
        assert!(alloc.validate());
        unsafe { alloc.release(Some(a)) };
        assert!(alloc.validate());
        unsafe { alloc.release(Some(b)) };
        assert!(alloc.validate());
    }

    #[test]
    fn validates_after_shrink_and_grow_resize() {
        let (mut alloc, _buf) = new_segment(512);
        let p = alloc.allocate(128).unwrap();
        let p = unsafe { alloc.resize(Some(p), 32) }.unwrap();
        assert!(alloc.validate());
        let p = unsafe { alloc.resize(Some(p), 200) }.unwrap();
        assert!(alloc.validate());
        unsafe { alloc.release(Some(p)) };
        assert!(alloc.validate());
    }

    #[test]
    fn detects_used_bytes_tampering() {
        let (mut alloc, _buf) = new_segment(256);
        let _ = alloc.allocate(32).unwrap();
        alloc.used_bytes += 1000;
        assert!(!alloc.validate());
    }
}
