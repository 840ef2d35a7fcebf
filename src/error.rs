//! Error kinds the engine distinguishes internally.

/// Why a fallible allocator primitive did not complete.
///
/// The public `init`/`allocate`/`resize` surface collapses all of these
/// down to `bool`/`None`, matching `kernel-alloc::vmm::Vmm::map_region`'s
/// layering over `AddressSpace`'s own error type; use the `try_*` entry
/// points when the distinction matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// The segment passed to `init` is smaller than `MIN_BLOCK_SIZE`.
    #[error("segment of {0} bytes is smaller than the minimum block size")]
    InitTooSmall(usize),
    /// `allocate`/`resize` was asked for zero bytes.
    #[error("requested allocation of zero bytes")]
    RequestZero,
    /// The request exceeds `MAX_REQUEST_SIZE`.
    #[error("requested {0} bytes, exceeding the maximum request size")]
    RequestTooLarge(usize),
    /// No free block is large enough, even after right-coalescing.
    #[error("no free block large enough for {0} bytes")]
    OutOfSpace(usize),
    /// A grow-resize's move fallback could not find space; the original
    /// block is left untouched.
    #[error("resize fallback allocation of {0} bytes failed; original block untouched")]
    ResizeFallbackFailed(usize),
}
