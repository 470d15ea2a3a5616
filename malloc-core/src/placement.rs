//! The placement engine: finding a free block that satisfies a request and
//! carving it down to size.
//!
//! Neither function here touches the memory primitive or grows the heap;
//! that is [`crate::heap`]'s job. This module only rearranges blocks that
//! already exist.

use core::ptr::NonNull;

use crate::free_list::FreeList;
use crate::layout::{self, MIN_BLOCK_SIZE};
use crate::reclamation::coalesce;

/// Walks `list` head to tail, first-fit: returns the first block whose size
/// is at least `asize`.
///
/// # Safety
/// Every block linked into `list` must have valid boundary tags and link
/// slots.
#[must_use]
pub unsafe fn find_fit(list: &FreeList, asize: usize) -> Option<NonNull<u8>> {
    unsafe { list.iter() }.find(|&bp| unsafe { layout::size(bp) } >= asize)
}

/// Services a request of `asize` bytes from the free block `bp` (of size
/// `csize`), splitting off the remainder when it is large enough to stand
/// on its own.
///
/// `bp` must already have been removed from, or never been inserted into,
/// no free list bookkeeping is touched here for `bp` itself — the caller is
/// expected to have found `bp` via [`find_fit`] and now hands it off to be
/// consumed. The optional remainder block is coalesced and (re-)inserted.
///
/// # Safety
/// `bp` must be a currently-free block of size `csize = layout::size(bp)`,
/// linked into `list`, with `csize >= asize`.
pub unsafe fn place(list: &mut FreeList, bp: NonNull<u8>, asize: usize) {
    let csize = unsafe { layout::size(bp) };
    debug_assert!(csize >= asize);

    unsafe { list.remove(bp) };

    if csize - asize >= MIN_BLOCK_SIZE {
        unsafe { layout::set_header_footer(bp, asize, true) };
        let remainder = unsafe { layout::next_block(bp) };
        unsafe { layout::set_header_footer(remainder, csize - asize, false) };
        unsafe { coalesce(list, remainder) };
    } else {
        unsafe { layout::set_header_footer(bp, csize, true) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(buf: &mut [u8]) -> NonNull<u8> {
        unsafe { NonNull::new_unchecked(buf.as_mut_ptr().add(4)) }
    }

    #[test]
    fn find_fit_picks_first_large_enough() {
        let mut a = [0u8; 4 + 32 + 4];
        let mut b = [0u8; 4 + 64 + 4];
        let bp_a = block(&mut a);
        let bp_b = block(&mut b);
        unsafe {
            layout::set_header_footer(bp_a, 32, false);
            layout::set_header_footer(bp_b, 64, false);
        }

        let mut list = FreeList::new();
        unsafe {
            list.insert_front(bp_a);
            list.insert_front(bp_b);
        }

        let found = unsafe { find_fit(&list, 40) };
        assert_eq!(found, Some(bp_a));
    }

    #[test]
    fn find_fit_returns_none_when_nothing_fits() {
        let mut a = [0u8; 4 + 32 + 4];
        let bp_a = block(&mut a);
        unsafe { layout::set_header_footer(bp_a, 32, false) };

        let mut list = FreeList::new();
        unsafe { list.insert_front(bp_a) };

        assert_eq!(unsafe { find_fit(&list, 1000) }, None);
    }

    #[test]
    fn place_splits_when_remainder_is_large_enough() {
        // A prologue, one 64-byte free block, and an epilogue, so
        // coalesce's neighbor checks stay in-bounds.
        let mut buf = [0u8; MIN_BLOCK_SIZE + 64 + 4];
        unsafe {
            let prologue = NonNull::new_unchecked(buf.as_mut_ptr().add(4));
            layout::set_header_footer(prologue, MIN_BLOCK_SIZE, true);
            let bp = layout::next_block(prologue);
            layout::set_header_footer(bp, 64, false);
            let epilogue = layout::next_block(bp);
            layout::set_epilogue(epilogue);

            let mut list = FreeList::new();
            list.insert_front(bp);

            place(&mut list, bp, 32);

            assert_eq!(layout::size(bp), 32);
            assert!(layout::is_allocated(bp));

            let remainder = layout::next_block(bp);
            assert_eq!(layout::size(remainder), 32);
            assert!(!layout::is_allocated(remainder));
            assert_eq!(list.head(), Some(remainder));
        }
    }

    #[test]
    fn place_consumes_whole_block_when_remainder_too_small() {
        let mut buf = [0u8; MIN_BLOCK_SIZE + 32 + 4];
        unsafe {
            let prologue = NonNull::new_unchecked(buf.as_mut_ptr().add(4));
            layout::set_header_footer(prologue, MIN_BLOCK_SIZE, true);
            let bp = layout::next_block(prologue);
            layout::set_header_footer(bp, 32, false);
            let epilogue = layout::next_block(bp);
            layout::set_epilogue(epilogue);

            let mut list = FreeList::new();
            list.insert_front(bp);

            // Remainder would be 32 - 24 = 8 bytes: too small to split off.
            place(&mut list, bp, 24);

            assert_eq!(layout::size(bp), 32);
            assert!(layout::is_allocated(bp));
            assert_eq!(list.head(), None);
        }
    }
}
