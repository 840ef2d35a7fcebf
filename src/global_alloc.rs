//! Optional host-facing [`GlobalAlloc`] adapter, behind the `global-alloc`
//! feature (off by default).
//!
//! This module sits outside the allocation engine proper: it exists only
//! to show how a host would wire [`Allocator`] in as the process/kernel
//! global allocator over a single static backing region, mirroring
//! `kernel`'s own `allocator/kernel_allocator.rs` wiring of
//! `kernel-alloc`'s engine. There is no allocator logic here — all
//! invariants live in `allocator.rs`, `free_list.rs`, and `coalescer.rs`.

use crate::Allocator;
use core::alloc::{GlobalAlloc, Layout};
use core::cell::UnsafeCell;
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicBool, Ordering};

/// A trivial spin-wait mutex, sufficient for uniprocessor/early-boot use.
///
/// The allocation engine itself does not depend on a synchronization crate
/// since it is explicitly single-threaded; this adapter needs one only
/// because `GlobalAlloc` implementations are reached from arbitrary call
/// sites and must appear `Sync`.
struct SpinLock<T> {
    locked: AtomicBool,
    inner: UnsafeCell<T>,
}

// Safety: `with_lock` only ever hands out `&mut T` while `locked` is held.
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    const fn new(inner: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            inner: UnsafeCell::new(inner),
        }
    }

    fn with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        while self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
        let result = f(unsafe { &mut *self.inner.get() });
        self.locked.store(false, Ordering::Release);
        result
    }
}

const HEAP_SIZE: usize = 16 * 1024 * 1024;

#[repr(align(16))]
struct HeapMem([u8; HEAP_SIZE]);

static mut HEAP: HeapMem = HeapMem([0; HEAP_SIZE]);
static ALLOC: SpinLock<Allocator> = SpinLock::new(Allocator::new());
static DID_INIT: AtomicBool = AtomicBool::new(false);

fn ensure_init() {
    if !DID_INIT.load(Ordering::Acquire) {
        ALLOC.with_lock(|alloc| {
            if alloc.segment_size() == 0 {
                let start = unsafe { (&raw mut HEAP.0).cast::<u8>() };
                unsafe {
                    alloc.init(start, HEAP_SIZE);
                }
                DID_INIT.store(true, Ordering::Release);
            }
        });
    }
}

/// Installs [`Allocator`] as the process/kernel `#[global_allocator]` over
/// a single statically reserved region.
pub struct GlobalAllocator;

unsafe impl GlobalAlloc for GlobalAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        ensure_init();
        ALLOC.with_lock(|alloc| {
            alloc
                .allocate(layout.size())
                .map_or(ptr::null_mut(), NonNull::as_ptr)
        })
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        ensure_init();
        ALLOC.with_lock(|alloc| unsafe { alloc.release(NonNull::new(ptr)) });
    }

    unsafe fn realloc(&self, ptr: *mut u8, _layout: Layout, new_size: usize) -> *mut u8 {
        ensure_init();
        ALLOC.with_lock(|alloc| unsafe {
            alloc
                .resize(NonNull::new(ptr), new_size)
                .map_or(ptr::null_mut(), NonNull::as_ptr)
        })
    }
}
