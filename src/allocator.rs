//! Allocation capability used by the tables.
//!
//! Tables never call the global allocator directly. They go through an
//! [`Allocator`], which lets callers supply arenas, counting allocators or
//! any other memory source. Two allocators that compare equal must be able
//! to free each other's blocks; the tables rely on this when moving a buffer
//! from one owner to another.

use core::alloc::Layout;
use core::fmt;
use core::ptr::NonNull;

/// The allocator reported that it could not satisfy a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocError;

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("memory allocation failed")
    }
}

impl core::error::Error for AllocError {}

/// A source of memory blocks for a table.
///
/// Equality between allocators is meaningful: `a == b` promises that memory
/// allocated by `a` may be released through `b`. The tables use this to
/// decide whether a move may steal a buffer or has to transfer entries one by
/// one.
///
/// # Safety
///
/// - A block returned by `allocate` must be valid for reads and writes of
///   `layout.size()` bytes, aligned to `layout.align()`, and must stay valid
///   until it is passed to `deallocate` on this allocator (or one comparing
///   equal to it).
/// - Clones of an allocator must compare equal to the original.
pub unsafe trait Allocator: PartialEq {
    /// Allocates a block described by `layout`.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Releases a block previously returned by [`Allocator::allocate`].
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this allocator (or one
    /// comparing equal to it) with the same `layout`, and must not have been
    /// released already.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The global heap, via `alloc::alloc`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Global;

// SAFETY: Blocks come from the global allocator and are freed back to it.
// Every `Global` compares equal, and they all share the one global heap.
unsafe impl Allocator for Global {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        debug_assert!(layout.size() != 0);
        // SAFETY: The tables never request zero-sized layouts.
        let raw = unsafe { alloc::alloc::alloc(layout) };
        NonNull::new(raw).ok_or(AllocError)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: Caller guarantees `ptr` came from `allocate` with `layout`.
        unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

// SAFETY: Forwards to `A`, whose blocks stay valid for as long as `A` does.
unsafe impl<A: Allocator> Allocator for &A {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: Forwarded contract.
        unsafe { (**self).deallocate(ptr, layout) }
    }
}
