//! The reclamation engine: returning a block to the free list and merging
//! it with whichever physically adjacent blocks are also free.
//!
//! The prologue is always allocated and the epilogue is always allocated,
//! so the four-case table below never needs a bounds check — every `bp`
//! passed here is guaranteed to have a real, readable neighbor on both
//! sides.

use core::ptr::NonNull;

use crate::free_list::FreeList;
use crate::layout;

/// Marks `bp` free and merges it with any free neighbors, leaving exactly
/// one free block in its place on `list`.
///
/// Returns the block pointer of the (possibly extended) free block, which
/// may differ from `bp` if the previous physical block absorbed it.
///
/// # Safety
/// `bp` must currently be an allocated block with valid boundary tags, not
/// linked into `list`. Its physical neighbors (previous and next) must have
/// valid boundary tags.
pub unsafe fn coalesce(list: &mut FreeList, bp: NonNull<u8>) -> NonNull<u8> {
    let prev = unsafe { layout::prev_block(bp) };
    let next = unsafe { layout::next_block(bp) };
    let prev_alloc = unsafe { layout::is_allocated(prev) };
    let next_alloc = unsafe { layout::is_allocated(next) };
    let size = unsafe { layout::size(bp) };

    let merged = match (prev_alloc, next_alloc) {
        (true, true) => {
            unsafe { layout::set_header_footer(bp, size, false) };
            bp
        }
        (true, false) => {
            let next_size = unsafe { layout::size(next) };
            unsafe { list.remove(next) };
            unsafe { layout::set_header_footer(bp, size + next_size, false) };
            bp
        }
        (false, true) => {
            let prev_size = unsafe { layout::size(prev) };
            unsafe { list.remove(prev) };
            unsafe { layout::set_header_footer(prev, prev_size + size, false) };
            prev
        }
        (false, false) => {
            let prev_size = unsafe { layout::size(prev) };
            let next_size = unsafe { layout::size(next) };
            unsafe { list.remove(prev) };
            unsafe { list.remove(next) };
            unsafe { layout::set_header_footer(prev, prev_size + size + next_size, false) };
            prev
        }
    };

    unsafe { list.insert_front(merged) };
    merged
}

/// Frees `bp`. A null `bp` is a no-op, matching the public API's tolerance
/// of `free(null)`.
///
/// # Safety
/// If `bp` is `Some`, it must currently be an allocated block obtained from
/// this allocator's `malloc`/`realloc` and not already freed.
pub unsafe fn free(list: &mut FreeList, bp: Option<NonNull<u8>>) {
    let Some(bp) = bp else { return };
    let size = unsafe { layout::size(bp) };
    unsafe { layout::set_header_footer(bp, size, false) };
    unsafe { coalesce(list, bp) };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::MIN_BLOCK_SIZE;

    /// Lays out prologue | block A (32) | block B (32) | epilogue in one
    /// buffer and returns (bp_a, bp_b).
    fn two_block_heap(buf: &mut [u8]) -> (NonNull<u8>, NonNull<u8>) {
        unsafe {
            let prologue = NonNull::new_unchecked(buf.as_mut_ptr().add(4));
            layout::set_header_footer(prologue, MIN_BLOCK_SIZE, true);
            let a = layout::next_block(prologue);
            layout::set_header_footer(a, 32, true);
            let b = layout::next_block(a);
            layout::set_header_footer(b, 32, true);
            let epilogue = layout::next_block(b);
            layout::set_epilogue(epilogue);
            (a, b)
        }
    }

    #[test]
    fn coalesce_with_allocated_neighbors_just_frees() {
        let mut buf = [0u8; MIN_BLOCK_SIZE + 32 + 32 + 4];
        let (a, _b) = two_block_heap(&mut buf);
        let mut list = FreeList::new();
        unsafe {
            free(&mut list, Some(a));
            assert!(!layout::is_allocated(a));
            assert_eq!(layout::size(a), 32);
            assert_eq!(list.head(), Some(a));
        }
    }

    #[test]
    fn coalesce_merges_with_free_next() {
        let mut buf = [0u8; MIN_BLOCK_SIZE + 32 + 32 + 4];
        let (a, b) = two_block_heap(&mut buf);
        let mut list = FreeList::new();
        unsafe {
            free(&mut list, Some(b));
            free(&mut list, Some(a));

            assert_eq!(layout::size(a), 64);
            assert!(!layout::is_allocated(a));
            assert_eq!(list.head(), Some(a));
            assert_eq!(unsafe { list.iter() }.count(), 1);
        }
    }

    #[test]
    fn coalesce_merges_with_free_prev() {
        let mut buf = [0u8; MIN_BLOCK_SIZE + 32 + 32 + 4];
        let (a, b) = two_block_heap(&mut buf);
        let mut list = FreeList::new();
        unsafe {
            free(&mut list, Some(a));
            free(&mut list, Some(b));

            assert_eq!(layout::size(a), 64);
            assert!(!layout::is_allocated(a));
            assert_eq!(list.head(), Some(a));
            assert_eq!(unsafe { list.iter() }.count(), 1);
        }
    }

    #[test]
    fn coalesce_merges_both_neighbors() {
        let mut buf = [0u8; MIN_BLOCK_SIZE + 32 + 32 + 32 + 4];
        unsafe {
            let prologue = NonNull::new_unchecked(buf.as_mut_ptr().add(4));
            layout::set_header_footer(prologue, MIN_BLOCK_SIZE, true);
            let a = layout::next_block(prologue);
            layout::set_header_footer(a, 32, true);
            let b = layout::next_block(a);
            layout::set_header_footer(b, 32, true);
            let c = layout::next_block(b);
            layout::set_header_footer(c, 32, true);
            let epilogue = layout::next_block(c);
            layout::set_epilogue(epilogue);

            let mut list = FreeList::new();
            free(&mut list, Some(a));
            free(&mut list, Some(c));
            free(&mut list, Some(b));

            assert_eq!(layout::size(a), 96);
            assert!(!layout::is_allocated(a));
            assert_eq!(list.head(), Some(a));
            assert_eq!(unsafe { list.iter() }.count(), 1);
        }
    }

    #[test]
    fn free_of_null_is_a_no_op() {
        let mut list = FreeList::new();
        unsafe { free(&mut list, None) };
        assert_eq!(list.head(), None);
    }
}
