//! Block layout and boundary tags.
//!
//! Every block in the heap looks like this, where `S` is the block's total
//! size in bytes (a multiple of 8, at least [`MIN_BLOCK_SIZE`]):
//!
//! ```text
//! offset 0:     header   (4 bytes)  = (S & !7) | alloc_bit
//! offset 4:     payload begins here (the block pointer `bp`)
//! offset S-4:   footer   (4 bytes)  = same encoding as header
//! ```
//!
//! Free blocks additionally store `prev_free`/`next_free` pointers at the
//! start of their payload area; see [`crate::free_list`]. This module only
//! knows about the header/footer pair and pure address arithmetic — it
//! never reads or writes the free-list pointers, so it is safe to call on
//! both allocated and free blocks.

use core::mem::size_of;
use core::ptr::NonNull;

/// Header and footer are each one 32-bit word, regardless of target
/// pointer width — this keeps `words * 4` math in `extend_heap` portable.
pub const TAG_SIZE: usize = size_of::<u32>();

/// Low 3 bits of a size-and-alloc word are reserved for flags (only the
/// low bit is used); block sizes are always 8-byte aligned so these bits
/// are free.
const SIZE_MASK: u32 = !0x7;

/// Smallest block that can hold a header, both free-list pointers, and a
/// footer, rounded up to 8-byte alignment. Derived from pointer size rather
/// than hard-coded, per the spec's note that 24 bytes is a 64-bit-specific
/// consequence of this formula (16 bytes on 32-bit targets).
pub const MIN_BLOCK_SIZE: usize = align8(2 * TAG_SIZE + 2 * size_of::<usize>());

/// 8-byte alignment granularity for block sizes and payload pointers.
pub const ALIGNMENT: usize = 8;

/// Rounds `n` up to the next multiple of [`ALIGNMENT`].
///
/// Only ever called at compile time or with already-bounded `n`; callers
/// taking a caller-supplied request size must go through
/// [`checked_block_size`] instead, which cannot silently wrap.
#[must_use]
pub const fn align8(n: usize) -> usize {
    (n + (ALIGNMENT - 1)) & !(ALIGNMENT - 1)
}

/// Computes the total block size needed to satisfy a `payload`-byte
/// request: the payload rounded up to [`ALIGNMENT`], plus header and
/// footer tags, floored at [`MIN_BLOCK_SIZE`].
///
/// Returns `None` if `payload` is too large to align and pad without
/// overflowing `usize`, so the caller can treat it as resource exhaustion
/// rather than panicking.
#[must_use]
pub fn checked_block_size(payload: usize) -> Option<usize> {
    let aligned = payload.checked_add(ALIGNMENT - 1)? & !(ALIGNMENT - 1);
    let asize = aligned.checked_add(2 * TAG_SIZE)?;
    Some(asize.max(MIN_BLOCK_SIZE))
}

/// Packs a block size and allocation bit into a boundary-tag word.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
const fn pack(size: usize, alloc: bool) -> u32 {
    (size as u32 & SIZE_MASK) | (alloc as u32)
}

/// Address of `bp`'s header (the 4 bytes immediately preceding the payload).
#[must_use]
pub fn header_ptr(bp: NonNull<u8>) -> *mut u32 {
    bp.as_ptr().wrapping_sub(TAG_SIZE).cast()
}

/// Address of `bp`'s footer, given its size. The caller must know `size`
/// already (usually via [`size`]) since the footer sits at the *end* of a
/// variable-length block.
#[must_use]
fn footer_ptr(bp: NonNull<u8>, size: usize) -> *mut u32 {
    // The block spans [bp - TAG_SIZE, bp - TAG_SIZE + size); the footer is
    // the last TAG_SIZE bytes of that span.
    bp.as_ptr().wrapping_add(size - 2 * TAG_SIZE).cast()
}

/// Reads the size encoded in `bp`'s header.
///
/// # Safety
/// `bp`'s header must be a valid, initialized boundary tag.
#[must_use]
pub unsafe fn size(bp: NonNull<u8>) -> usize {
    let raw = unsafe { header_ptr(bp).read() };
    (raw & SIZE_MASK) as usize
}

/// Reads the allocation bit encoded in `bp`'s header.
///
/// # Safety
/// `bp`'s header must be a valid, initialized boundary tag.
#[must_use]
pub unsafe fn is_allocated(bp: NonNull<u8>) -> bool {
    let raw = unsafe { header_ptr(bp).read() };
    raw & 1 != 0
}

/// Writes matching header and footer tags for `bp`, encoding `size` and
/// `alloc`. Valid for both the allocated and free state; it is the caller's
/// responsibility to additionally maintain free-list membership.
///
/// # Safety
/// `[header_ptr(bp), bp + size)` must be valid for writes, and `size` must
/// be at least [`MIN_BLOCK_SIZE`] and a multiple of [`ALIGNMENT`].
pub unsafe fn set_header_footer(bp: NonNull<u8>, size: usize, alloc: bool) {
    debug_assert!(size >= MIN_BLOCK_SIZE);
    debug_assert_eq!(size % ALIGNMENT, 0);
    let tag = pack(size, alloc);
    unsafe {
        header_ptr(bp).write(tag);
        footer_ptr(bp, size).write(tag);
    }
}

/// Writes the zero-sized allocated epilogue marker at `bp`: a header word
/// only, no footer and no payload. Forward traversal (`next_block`) must
/// never be called past it; backward traversal from the block that follows
/// a fresh [`crate::heap::Allocator::extend_heap`] call relies on the old
/// epilogue's header having been overwritten rather than read as a footer.
///
/// # Safety
/// `header_ptr(bp)` must be valid for a 4-byte write.
pub unsafe fn set_epilogue(bp: NonNull<u8>) {
    unsafe { header_ptr(bp).write(pack(0, true)) };
}

/// Whether `bp`'s header and footer agree, given its encoded `size`.
///
/// # Safety
/// `bp` must have a valid header and a footer at the size-implied offset.
#[must_use]
pub unsafe fn tags_consistent(bp: NonNull<u8>, size: usize) -> bool {
    unsafe { header_ptr(bp).read() == footer_ptr(bp, size).read() }
}

/// Block pointer of the block physically following `bp`.
///
/// # Safety
/// `bp`'s header must be valid; the returned pointer is only meaningful if
/// `bp` is not the last block before the epilogue.
#[must_use]
pub unsafe fn next_block(bp: NonNull<u8>) -> NonNull<u8> {
    let sz = unsafe { size(bp) };
    unsafe { NonNull::new_unchecked(bp.as_ptr().wrapping_add(sz)) }
}

/// Block pointer of the block physically preceding `bp`, found by reading
/// the previous block's footer at `bp - 8`.
///
/// # Safety
/// The 4 bytes at `bp - 8` must be a valid footer tag (guaranteed by the
/// prologue sentinel for the first real block, and by every other block's
/// own footer otherwise).
#[must_use]
pub unsafe fn prev_block(bp: NonNull<u8>) -> NonNull<u8> {
    let prev_footer = bp.as_ptr().wrapping_sub(2 * TAG_SIZE).cast::<u32>();
    let prev_size = (unsafe { prev_footer.read() } & SIZE_MASK) as usize;
    unsafe { NonNull::new_unchecked(bp.as_ptr().wrapping_sub(prev_size)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(buf: &mut [u8]) -> NonNull<u8> {
        // payload starts 4 bytes into the buffer, mirroring a real block.
        unsafe { NonNull::new_unchecked(buf.as_mut_ptr().add(TAG_SIZE)) }
    }

    #[test]
    fn min_block_size_is_24_on_64_bit_pointers() {
        if size_of::<usize>() == 8 {
            assert_eq!(MIN_BLOCK_SIZE, 24);
        }
    }

    #[test]
    fn align8_rounds_up_to_multiples_of_eight() {
        assert_eq!(align8(1), 8);
        assert_eq!(align8(8), 8);
        assert_eq!(align8(9), 16);
        assert_eq!(align8(24), 24);
    }

    #[test]
    fn checked_block_size_pads_and_floors_at_minimum() {
        assert_eq!(checked_block_size(1), Some(MIN_BLOCK_SIZE));
        assert_eq!(checked_block_size(32), Some(32 + 2 * TAG_SIZE));
    }

    #[test]
    fn checked_block_size_rejects_unrepresentable_requests() {
        assert_eq!(checked_block_size(usize::MAX), None);
        assert_eq!(checked_block_size(usize::MAX - 4), None);
    }

    #[test]
    fn set_and_read_round_trip() {
        let mut buf = [0u8; 32];
        let bp = block(&mut buf);
        unsafe {
            set_header_footer(bp, 32, true);
            assert_eq!(size(bp), 32);
            assert!(is_allocated(bp));

            set_header_footer(bp, 32, false);
            assert!(!is_allocated(bp));
        }
    }

    #[test]
    fn header_and_footer_agree() {
        let mut buf = [0u8; 32];
        let bp = block(&mut buf);
        unsafe {
            set_header_footer(bp, 32, true);
            assert_eq!(header_ptr(bp).read(), footer_ptr(bp, 32).read());
        }
    }

    #[test]
    fn next_block_steps_by_size() {
        let mut buf = [0u8; 64];
        let bp = block(&mut buf);
        unsafe {
            set_header_footer(bp, 24, true);
            let next = next_block(bp);
            assert_eq!(next.as_ptr() as usize - bp.as_ptr() as usize, 24);
        }
    }

    #[test]
    fn prev_block_reads_preceding_footer() {
        let mut buf = [0u8; 64];
        let first = block(&mut buf);
        unsafe {
            set_header_footer(first, 24, true);
            let second = next_block(first);
            set_header_footer(second, 24, false);
            let back = prev_block(second);
            assert_eq!(back, first);
        }
    }
}
