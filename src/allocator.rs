//! Allocator operations: `init`, `allocate`, `release`, `resize`.

use crate::block::next_physical;
use crate::config::{ALIGNMENT, HEADER_SIZE, MAX_REQUEST_SIZE, MIN_BLOCK_SIZE};
use crate::error::AllocError;
use crate::header::Header;
use core::ptr::NonNull;
use log::{trace, warn};

/// A single-threaded, fixed-region explicit free-list heap allocator.
///
/// All state — the managed segment's bounds, the running byte count, and
/// the free-list head/tail — lives explicitly in this struct rather than
/// behind module statics, so a host can run as many independent allocators
/// as it has segments for. Thread safety, runtime segment growth,
/// size-class segregation, relocating defragmentation, and hardening
/// against corrupted client payloads are all out of scope; a host that
/// needs concurrent access must serialize it externally, the way
/// `kernel-alloc`'s `SpinLock` wraps its own allocator.
pub struct Allocator {
    segment_start: *mut u8,
    segment_size: usize,
    pub(crate) used_bytes: usize,
    pub(crate) base: Option<Header>,
    pub(crate) end: Option<Header>,
}

// Safety: `Allocator` holds no thread-affine state of its own and performs
// no interior mutability; every method takes `&mut self`. Concurrent access
// from multiple threads still requires host-side serialization.
unsafe impl Send for Allocator {}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
const fn round_up(n: usize, mult: usize) -> usize {
    (n + mult - 1) & !(mult - 1)
}

/// `T = max(MIN_BLOCK_SIZE, round_up(n + HEADER_SIZE, ALIGNMENT))`: the
/// total block size needed to satisfy a request for `n` payload bytes.
#[inline]
const fn required_total_size(n: usize) -> usize {
    let rounded = round_up(n + HEADER_SIZE, ALIGNMENT);
    if rounded < MIN_BLOCK_SIZE {
        MIN_BLOCK_SIZE
    } else {
        rounded
    }
}

impl Allocator {
    /// Constructs an allocator with no managed segment yet. `allocate`
    /// returns `None`, and `release`/`resize` are no-ops, until a
    /// successful [`init`](Self::init) or [`try_init`](Self::try_init).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            segment_start: core::ptr::null_mut(),
            segment_size: 0,
            used_bytes: 0,
            base: None,
            end: None,
        }
    }

    /// Bytes of client payload currently allocated. Header bytes are never
    /// counted.
    #[must_use]
    pub const fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Total size of the managed segment, in bytes. Zero before `init`.
    #[must_use]
    pub const fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Prepares a host-supplied memory segment for allocation.
    ///
    /// Infallible-looking wrapper over [`try_init`](Self::try_init); logs
    /// and returns `false` on failure instead of propagating the error.
    ///
    /// # Safety
    /// `segment_start` must point at `segment_size` bytes of valid,
    /// writable, `ALIGNMENT`-aligned memory that nothing else accesses for
    /// the lifetime of this allocator.
    pub unsafe fn init(&mut self, segment_start: *mut u8, segment_size: usize) -> bool {
        match unsafe { self.try_init(segment_start, segment_size) } {
            Ok(()) => true,
            Err(err) => {
                warn!("init failed: {err}");
                false
            }
        }
    }

    /// Fallible form of [`init`](Self::init) that reports why a segment
    /// was rejected.
    ///
    /// # Safety
    /// Same contract as [`init`](Self::init).
    pub unsafe fn try_init(
        &mut self,
        segment_start: *mut u8,
        segment_size: usize,
    ) -> Result<(), AllocError> {
        if segment_size < MIN_BLOCK_SIZE {
            return Err(AllocError::InitTooSmall(segment_size));
        }
        debug_assert_eq!(segment_start as usize % ALIGNMENT, 0, "segment must be aligned");

        self.segment_start = segment_start;
        self.segment_size = segment_size;
        self.used_bytes = 0;
        self.base = None;
        self.end = None;

        let whole = unsafe { Header::at(segment_start) };
        whole.write(segment_size, false);
        self.end = Some(whole);
        self.insert_head(whole);

        trace!("init: segment of {segment_size} bytes at {segment_start:p}");
        Ok(())
    }

    /// Allocates a block of at least `requested_bytes` and returns its
    /// payload pointer, or `None` if the request cannot be satisfied.
    ///
    /// Infallible-looking wrapper over
    /// [`try_allocate`](Self::try_allocate); logs and returns `None` on
    /// failure instead of propagating the error.
    #[must_use]
    pub fn allocate(&mut self, requested_bytes: usize) -> Option<NonNull<u8>> {
        match self.try_allocate(requested_bytes) {
            Ok(ptr) => Some(ptr),
            Err(err) => {
                warn!("allocate({requested_bytes}) failed: {err}");
                None
            }
        }
    }

    /// Fallible form of [`allocate`](Self::allocate) that reports why a
    /// request failed.
    pub fn try_allocate(&mut self, requested_bytes: usize) -> Result<NonNull<u8>, AllocError> {
        if requested_bytes == 0 {
            return Err(AllocError::RequestZero);
        }
        if requested_bytes > MAX_REQUEST_SIZE {
            return Err(AllocError::RequestTooLarge(requested_bytes));
        }

        let total = required_total_size(requested_bytes);
        if self.used_bytes + total > self.segment_size {
            return Err(AllocError::OutOfSpace(requested_bytes));
        }

        let chosen = self
            .find_fit(total)
            .ok_or(AllocError::OutOfSpace(requested_bytes))?;
        self.take_block(chosen, total);

        trace!("allocate({requested_bytes}) -> {:p} (block size {total})", chosen.payload());
        Ok(chosen.payload())
    }

    /// Removes `chosen` from the free list and marks it used, splitting off
    /// a free remainder when `chosen` is large enough to host one.
    fn take_block(&mut self, chosen: Header, total: usize) {
        let original_size = chosen.size();
        self.unlink(chosen);

        if original_size >= total + MIN_BLOCK_SIZE {
            chosen.write(total, true);
            self.used_bytes += total - HEADER_SIZE;

            let remainder_size = original_size - total;
            let was_end = self.end == Some(chosen);
            let remainder = unsafe { next_physical(chosen) };
            remainder.write(remainder_size, false);
            if was_end {
                self.end = Some(remainder);
            }
            self.insert_head(remainder);
        } else {
            chosen.write(original_size, true);
            self.used_bytes += original_size - HEADER_SIZE;
        }
    }

    /// Returns a previously allocated block to the free list. A `None`
    /// (null) pointer is a no-op.
    ///
    /// # Safety
    /// `ptr`, if present, must be a pointer previously returned by
    /// `allocate` or `resize` on this allocator, and not already released.
    pub unsafe fn release(&mut self, ptr: Option<NonNull<u8>>) {
        let Some(ptr) = ptr else { return };
        let h = unsafe { Header::from_payload(ptr) };

        self.used_bytes -= h.size() - HEADER_SIZE;
        h.mark_used(false);
        self.coalesce_right_if_free(h);
        self.insert_head(h);

        trace!("release {ptr:p}");
    }

    /// Grows or shrinks a previously allocated block to `new_bytes`,
    /// returning its (possibly new) payload pointer.
    ///
    /// Infallible-looking wrapper over [`try_resize`](Self::try_resize);
    /// logs and returns `None` on failure instead of propagating the
    /// error. A `None` `ptr` behaves like `allocate`; a `new_bytes` of
    /// zero behaves like `release` and returns `None`.
    ///
    /// # Safety
    /// Same contract as [`release`](Self::release) for `ptr`.
    #[must_use]
    pub unsafe fn resize(
        &mut self,
        ptr: Option<NonNull<u8>>,
        new_bytes: usize,
    ) -> Option<NonNull<u8>> {
        match unsafe { self.try_resize(ptr, new_bytes) } {
            Ok(result) => result,
            Err(err) => {
                warn!("resize failed: {err}");
                None
            }
        }
    }

    /// Fallible form of [`resize`](Self::resize) that reports why a grow
    /// fallback failed.
    ///
    /// # Safety
    /// Same contract as [`release`](Self::release) for `ptr`.
    pub unsafe fn try_resize(
        &mut self,
        ptr: Option<NonNull<u8>>,
        new_bytes: usize,
    ) -> Result<Option<NonNull<u8>>, AllocError> {
        let Some(ptr) = ptr else {
            return self.try_allocate(new_bytes).map(Some);
        };
        if new_bytes == 0 {
            unsafe { self.release(Some(ptr)) };
            return Ok(None);
        }

        let h = unsafe { Header::from_payload(ptr) };
        let old_size = h.size();
        let new_total = required_total_size(new_bytes);

        if new_total <= old_size {
            self.shrink_in_place(h, new_total, old_size);
            return Ok(Some(ptr));
        }

        if self.grow_in_place(h, new_total) {
            return Ok(Some(ptr));
        }

        match self.try_allocate(new_bytes) {
            Ok(new_ptr) => {
                let to_copy = core::cmp::min(old_size - HEADER_SIZE, new_bytes);
                unsafe {
                    core::ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), to_copy);
                    self.release(Some(ptr));
                }
                Ok(Some(new_ptr))
            }
            Err(_) => Err(AllocError::ResizeFallbackFailed(new_bytes)),
        }
    }

    /// Shrinks `h` in place. If the remainder is at least `MIN_BLOCK_SIZE`
    /// it is split off and freed, coalescing right when possible; a
    /// remainder smaller than that (including exactly `MIN_BLOCK_SIZE - 1`,
    /// but not exactly `MIN_BLOCK_SIZE`, which *is* split off) is left
    /// absorbed into `h`. The payload address is always preserved.
    fn shrink_in_place(&mut self, h: Header, new_total: usize, old_size: usize) {
        let remainder_size = old_size - new_total;
        if remainder_size < MIN_BLOCK_SIZE {
            return;
        }

        let was_end = self.end == Some(h);
        h.write(new_total, true);
        let remainder = unsafe { next_physical(h) };
        remainder.write(remainder_size, false);
        if was_end {
            self.end = Some(remainder);
        }
        self.used_bytes -= remainder_size;

        self.coalesce_right_if_free(remainder);
        self.insert_head(remainder);
    }

    /// Attempts to satisfy a grow-resize in place by repeatedly absorbing
    /// free right neighbours. Returns `true`, having split
    /// off any surplus of at least `MIN_BLOCK_SIZE`, if `h` reached
    /// `new_total`. Returns `false` if the chain of free right neighbours
    /// ran out first — `h`'s header may already have grown in that case;
    /// the caller is responsible for either keeping the (now larger) block
    /// or releasing it.
    fn grow_in_place(&mut self, h: Header, new_total: usize) -> bool {
        while h.size() < new_total {
            if !self.has_right_neighbour(h) {
                return false;
            }
            let next = unsafe { next_physical(h) };
            if next.is_used() {
                return false;
            }
            self.merge_right(h, next);
        }
        self.split_surplus(h, new_total);
        true
    }

    /// Splits a free remainder off `h` if its size exceeds `needed` by at
    /// least `MIN_BLOCK_SIZE`. Used after an in-place grow whose coalesced
    /// size may overshoot the target.
    fn split_surplus(&mut self, h: Header, needed: usize) {
        let total = h.size();
        if total < needed + MIN_BLOCK_SIZE {
            return;
        }

        let remainder_size = total - needed;
        let was_end = self.end == Some(h);
        h.write(needed, true);
        let remainder = unsafe { next_physical(h) };
        remainder.write(remainder_size, false);
        if was_end {
            self.end = Some(remainder);
        }
        self.used_bytes -= remainder_size;

        self.coalesce_right_if_free(remainder);
        self.insert_head(remainder);
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
    fn init_rejects_segment_smaller_than_min_block() {
        let mut alloc = Allocator::new();
        let mut buf = vec![0u8; MIN_BLOCK_SIZE - 1];
        assert!(!unsafe { alloc.init(buf.as_mut_ptr(), buf.len()) });
    }

    #[test]
    fn init_creates_one_free_block_spanning_segment() {
        let (alloc, _buf) = new_segment(256);
        assert_eq!(alloc.used_bytes(), 0);
        assert_eq!(alloc.base.unwrap().size(), 256);
        assert_eq!(alloc.end, alloc.base);
    }

    #[test]
    fn allocate_zero_bytes_fails() {
        let (mut alloc, _buf) = new_segment(256);
        assert!(alloc.allocate(0).is_none());
    }

    #[test]
    fn allocate_more_than_max_request_size_fails() {
        let (mut alloc, _buf) = new_segment(256);
        assert!(matches!(
            alloc.try_allocate(MAX_REQUEST_SIZE + 1),
            Err(AllocError::RequestTooLarge(_))
        ));
    }

    #[test]
    fn allocate_then_release_returns_to_one_free_block() {
        let (mut alloc, _buf) = new_segment(256);
        let p = alloc.allocate(40).expect("fits");
        assert!(alloc.used_bytes() > 0);
        unsafe { alloc.release(Some(p)) };
        assert_eq!(alloc.used_bytes(), 0);
        assert_eq!(alloc.free_list_iter().count(), 1);
    }

    #[test]
    fn release_of_null_is_a_no_op() {
        let (mut alloc, _buf) = new_segment(256);
        let used_before = alloc.used_bytes();
        unsafe { alloc.release(None) };
        assert_eq!(alloc.used_bytes(), used_before);
    }

    #[test]
    fn resize_to_zero_releases_and_returns_none() {
        let (mut alloc, _buf) = new_segment(256);
        let p = alloc.allocate(40).expect("fits");
        let result = unsafe { alloc.resize(Some(p), 0) };
        assert!(result.is_none());
        assert_eq!(alloc.used_bytes(), 0);
    }

    #[test]
    fn resize_with_null_pointer_behaves_like_allocate() {
        let (mut alloc, _buf) = new_segment(256);
        let result = unsafe { alloc.resize(None, 40) };
        assert!(result.is_some());
    }

    #[test]
    fn segment_exactly_min_block_size_admits_one_allocation() {
        let (mut alloc, _buf) = new_segment(MIN_BLOCK_SIZE);
        let payload_capacity = MIN_BLOCK_SIZE - HEADER_SIZE;
        let p = alloc.allocate(payload_capacity).expect("exact fit");
        assert_eq!(alloc.used_bytes(), payload_capacity);
        unsafe { alloc.release(Some(p)) };
    }

    #[test]
    fn allocation_can_exactly_fill_the_segment() {
        let (mut alloc, _buf) = new_segment(256);
        let p = alloc.allocate(256 - HEADER_SIZE).expect("fills segment");
        assert!(alloc.allocate(1).is_none());
        unsafe { alloc.release(Some(p)) };
        assert!(alloc.allocate(1).is_some());
    }

    #[test]
    fn shrink_remainder_one_alignment_step_below_min_block_is_absorbed() {
        let (mut alloc, _buf) = new_segment(4096);
        let old_size = 2 * MIN_BLOCK_SIZE;
        let new_total = MIN_BLOCK_SIZE + ALIGNMENT; // remainder = MIN_BLOCK_SIZE - ALIGNMENT
        let p = alloc.allocate(old_size - HEADER_SIZE).unwrap();
        let used_before = alloc.used_bytes();

        let shrunk = unsafe { alloc.resize(Some(p), new_total - HEADER_SIZE) }.unwrap();

        assert_eq!(shrunk, p);
        assert_eq!(alloc.used_bytes(), used_before, "remainder below MIN_BLOCK_SIZE stays absorbed");
    }

    #[test]
    fn shrink_remainder_of_exactly_min_block_size_is_split() {
        let (mut alloc, _buf) = new_segment(4096);
        let old_size = 2 * MIN_BLOCK_SIZE;
        let new_total = MIN_BLOCK_SIZE; // remainder = MIN_BLOCK_SIZE exactly
        let p = alloc.allocate(old_size - HEADER_SIZE).unwrap();
        let used_before = alloc.used_bytes();

        let shrunk = unsafe { alloc.resize(Some(p), new_total - HEADER_SIZE) }.unwrap();

        assert_eq!(shrunk, p);
        assert_eq!(
            alloc.used_bytes(),
            used_before - MIN_BLOCK_SIZE,
            "remainder of exactly MIN_BLOCK_SIZE is split off and freed"
        );
    }
}
