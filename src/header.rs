//! Header codec: the 8-byte tag at the start of every block.
//!
//! Bit 0 is the allocation flag, bits 1-2 are reserved and always zero, and
//! bits 3-63 store the block's total size in bytes. Every block size is a
//! multiple of [`ALIGNMENT`], so the low three size bits are always zero and
//! are folded away rather than stored twice — the same trick
//! `kernel-vmem`'s `PageEntryBits` uses for its physical-address field.

use crate::config::{ALIGNMENT, HEADER_SIZE, MIN_BLOCK_SIZE};
use bitfield_struct::bitfield;
use core::ptr::NonNull;

#[bitfield(u64)]
struct RawHeader {
    /// Allocation flag (bit 0): set when the block is in use.
    used: bool,
    /// Reserved, always zero.
    #[bits(2)]
    reserved: u8,
    /// Block size in units of 8 bytes (bits 3..=63).
    #[bits(61)]
    size_words: u64,
}

/// A typed view over the header word at some address inside the segment.
///
/// `Header` does not own the memory it points at; it is a thin
/// [`NonNull<u64>`] wrapper. All access goes through `core::ptr` rather than
/// a `&`/`&mut` reference, since the bytes just past the header alternate
/// between being a free-list node and client payload depending on the
/// block's allocation state.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct Header(NonNull<u64>);

impl Header {
    /// Wraps a raw byte pointer as a header view.
    ///
    /// # Safety
    /// `ptr` must point at a valid, `ALIGNMENT`-aligned header word inside
    /// the managed segment.
    #[inline]
    pub(crate) unsafe fn at(ptr: *mut u8) -> Self {
        debug_assert_eq!(ptr as usize % ALIGNMENT, 0, "header must be aligned");
        Self(unsafe { NonNull::new_unchecked(ptr.cast()) })
    }

    #[inline]
    fn raw(self) -> RawHeader {
        RawHeader::from_bits(unsafe { self.0.as_ptr().read() })
    }

    #[inline]
    fn store(self, raw: RawHeader) {
        unsafe { self.0.as_ptr().write(raw.into_bits()) }
    }

    /// Total block size in bytes, header included.
    #[inline]
    pub(crate) fn size(self) -> usize {
        (self.raw().size_words() << 3) as usize
    }

    /// Whether this block is currently allocated.
    #[inline]
    pub(crate) fn is_used(self) -> bool {
        self.raw().used()
    }

    /// Encodes `size` and `used` into the header word.
    ///
    /// `size` must already be `ALIGNMENT`-aligned and at least
    /// `MIN_BLOCK_SIZE`.
    #[inline]
    pub(crate) fn write(self, size: usize, used: bool) {
        debug_assert_eq!(size % ALIGNMENT, 0, "block size must be aligned");
        debug_assert!(size >= MIN_BLOCK_SIZE, "block smaller than MIN_BLOCK_SIZE");
        self.store(RawHeader::new().with_used(used).with_size_words((size >> 3) as u64));
    }

    /// Flips the allocation flag without touching the size field.
    #[inline]
    pub(crate) fn mark_used(self, used: bool) {
        self.store(self.raw().with_used(used));
    }

    /// Byte address of this header.
    #[inline]
    pub(crate) fn addr(self) -> *mut u8 {
        self.0.as_ptr().cast()
    }

    /// Byte address of the payload following this header.
    #[inline]
    pub(crate) fn payload(self) -> NonNull<u8> {
        unsafe { NonNull::new_unchecked(self.addr().add(HEADER_SIZE)) }
    }

    /// Recovers the header for a payload pointer previously handed to a
    /// client.
    ///
    /// # Safety
    /// `payload` must be a pointer previously returned as a block's payload
    /// by this allocator.
    #[inline]
    pub(crate) unsafe fn from_payload(payload: NonNull<u8>) -> Self {
        unsafe { Self::at(payload.as_ptr().sub(HEADER_SIZE)) }
    }
}
