//! The memory primitive contract consumed by [`crate::heap::Allocator`].
//!
//! This is the "external collaborator" of the allocator: a `sbrk`-style
//! provider of a contiguous, monotonically growing byte range. The core
//! never allocates memory on its own behalf and never knows whether the
//! bytes ultimately came from a static array, a host `Vec`, or a real OS
//! page fault handler — it only ever calls through this trait.

use core::ptr::NonNull;

use crate::error::MemoryError;

/// A source of contiguous, monotonically growing memory.
///
/// Implementors own exactly one heap region. Growth is irreversible: once
/// `grow` has returned a range, that range remains valid and stable (it is
/// never moved or shrunk) for the lifetime of the source.
///
/// # Safety
///
/// Implementors must uphold:
/// - The byte range `[heap_lo(), heap_hi()]` is valid for reads and writes
///   for as long as the source is not reset.
/// - A successful `grow(n)` extends the high end of that range by exactly
///   `n` bytes and returns a pointer to the first new byte.
/// - The returned base address, and `heap_lo()`, are 8-byte aligned.
pub unsafe trait MemorySource {
    /// Extends the managed region by exactly `bytes` bytes at the high end.
    ///
    /// Returns the address of the first newly granted byte.
    ///
    /// # Errors
    /// Returns [`MemoryError::OutOfMemory`] if no further growth is possible.
    fn grow(&mut self, bytes: usize) -> Result<NonNull<u8>, MemoryError>;

    /// Lowest address currently managed, or a dangling pointer before the
    /// first successful `grow`.
    fn heap_lo(&self) -> *mut u8;

    /// Highest *valid* address currently managed (inclusive), or a pointer
    /// below `heap_lo()` before the first successful `grow`.
    fn heap_hi(&self) -> *mut u8;

    /// Resets the source back to its empty state, for test-harness reuse
    /// across traces. Implementations that cannot reclaim memory from the
    /// OS may simply rewind an internal break pointer.
    fn reset(&mut self);
}
