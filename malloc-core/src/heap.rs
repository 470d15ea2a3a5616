//! Heap growth and the public allocator surface.
//!
//! [`Allocator`] owns the free-list registry and drives the placement and
//! reclamation engines over whatever [`MemorySource`] it is given. It holds
//! no state of its own beyond the free list and the current epilogue's
//! location, everything else lives embedded in the managed bytes.

use core::ptr::NonNull;

use crate::error::{CheckHeapError, MemoryError};
use crate::free_list::{self, FreeList};
use crate::layout::{self, ALIGNMENT, MIN_BLOCK_SIZE, TAG_SIZE};
use crate::mem_source::MemorySource;
use crate::placement::{find_fit, place};
use crate::reclamation::{coalesce, free as reclaim_free};

/// Default heap-growth granularity, in bytes.
pub const CHUNKSIZE: usize = 1 << 12;

/// A single-threaded explicit free-list allocator over a [`MemorySource`].
pub struct Allocator<M: MemorySource> {
    source: M,
    free_list: FreeList,
    epilogue: Option<NonNull<u8>>,
}

// SAFETY: `Allocator` owns its memory source and free list exclusively, and
// nothing about it relies on thread-local state. It is sound to move across
// a thread boundary as long as it is never shared concurrently, which this
// crate's single-threaded contract (spec §5) already requires of callers.
unsafe impl<M: MemorySource + Send> Send for Allocator<M> {}

impl<M: MemorySource> Allocator<M> {
    /// Builds an allocator without performing any memory requests yet.
    /// Call [`Allocator::init`] before the first `malloc`.
    #[must_use]
    pub const fn new(source: M) -> Self {
        Self {
            source,
            free_list: FreeList::new(),
            epilogue: None,
        }
    }

    /// Installs the prologue/epilogue sentinels and performs the initial
    /// heap extension. Idempotent: calling `init` again resets the source
    /// and rebuilds from scratch, so a harness can run many traces
    /// back-to-back over one `Allocator`.
    ///
    /// # Errors
    /// Returns [`MemoryError::OutOfMemory`] if the source cannot grant the
    /// sentinel region or the initial `CHUNKSIZE` extension.
    pub fn init(&mut self) -> Result<(), MemoryError> {
        self.source.reset();
        self.free_list = FreeList::new();
        self.epilogue = None;

        let base = self.source.grow(MIN_BLOCK_SIZE + TAG_SIZE)?;
        // `base` is the start of the granted region, i.e. where the
        // prologue's *header* belongs; its block pointer sits one tag past.
        // SAFETY: `grow` just granted `MIN_BLOCK_SIZE + TAG_SIZE` fresh
        // bytes starting at `base`, 8-byte aligned per the `MemorySource`
        // contract.
        let prologue = unsafe { NonNull::new_unchecked(base.as_ptr().add(TAG_SIZE)) };
        unsafe { layout::set_header_footer(prologue, MIN_BLOCK_SIZE, true) };
        let epilogue = unsafe { layout::next_block(prologue) };
        unsafe { layout::set_epilogue(epilogue) };
        self.epilogue = Some(epilogue);

        log::debug!("heap initialized, prologue at {prologue:p}");
        self.extend_heap(CHUNKSIZE / 4)?;
        Ok(())
    }

    /// Requests `words` (rounded up to even) 4-byte words from the memory
    /// source and installs a new free block covering them, merging with
    /// whatever free block (if any) currently borders the old epilogue.
    ///
    /// Returns the (possibly coalesced) new free block's pointer.
    ///
    /// # Errors
    /// Returns [`MemoryError::OutOfMemory`] if the source has no more room
    /// to grant.
    ///
    /// # Panics
    /// Panics if called before [`Allocator::init`].
    fn extend_heap(&mut self, words: usize) -> Result<NonNull<u8>, MemoryError> {
        let words = words + (words % 2);
        let size = (words * 4).max(MIN_BLOCK_SIZE);

        let old_epilogue = self.epilogue.expect("init must run before extend_heap");
        let region = self.source.grow(size)?;
        debug_assert_eq!(
            region, old_epilogue,
            "MemorySource must extend contiguously from the prior high end"
        );

        // SAFETY: the old epilogue occupied only a header word (no footer,
        // no payload), so overwriting it in place leaves no stale tag.
        unsafe { layout::set_header_footer(old_epilogue, size, false) };

        let new_epilogue = unsafe { layout::next_block(old_epilogue) };
        unsafe { layout::set_epilogue(new_epilogue) };
        self.epilogue = Some(new_epilogue);

        log::debug!("heap extended by {size} bytes");
        Ok(unsafe { coalesce(&mut self.free_list, old_epilogue) })
    }

    /// Allocates a block of at least `size` usable bytes, or returns `None`
    /// on a zero-byte request or resource exhaustion.
    pub fn malloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }
        let asize = layout::checked_block_size(size)?;

        if let Some(bp) = unsafe { find_fit(&self.free_list, asize) } {
            unsafe { place(&mut self.free_list, bp, asize) };
            return Some(bp);
        }

        let extend_words = asize.max(CHUNKSIZE) / 4;
        let bp = self.extend_heap(extend_words).ok()?;
        debug_assert!(unsafe { layout::size(bp) } >= asize);
        unsafe { place(&mut self.free_list, bp, asize) };
        Some(bp)
    }

    /// Frees `bp`. A `None` pointer is a no-op.
    ///
    /// # Safety
    /// If `bp` is `Some`, it must be a pointer previously returned by
    /// `malloc`/`realloc` on this same allocator, not already freed.
    pub unsafe fn free(&mut self, bp: Option<NonNull<u8>>) {
        unsafe { reclaim_free(&mut self.free_list, bp) };
    }

    /// Reallocates `ptr` to hold at least `size` bytes, by baseline
    /// allocate-copy-free. `ptr == None` behaves as `malloc(size)`, and
    /// `size == 0` behaves as `free(ptr)` followed by returning `None`.
    ///
    /// # Safety
    /// If `ptr` is `Some`, it must be a pointer previously returned by
    /// `malloc`/`realloc` on this same allocator, not already freed.
    pub unsafe fn realloc(
        &mut self,
        ptr: Option<NonNull<u8>>,
        size: usize,
    ) -> Option<NonNull<u8>> {
        let Some(old) = ptr else {
            return self.malloc(size);
        };
        if size == 0 {
            unsafe { self.free(Some(old)) };
            return None;
        }

        let old_payload = unsafe { layout::size(old) } - 2 * TAG_SIZE;
        let new_bp = self.malloc(size)?;

        let copy_len = old_payload.min(size);
        // SAFETY: `old` and `new_bp` are both allocator-owned blocks with
        // at least `copy_len` live payload bytes each, and do not alias
        // (they were obtained from disjoint `malloc` calls).
        unsafe { core::ptr::copy_nonoverlapping(old.as_ptr(), new_bp.as_ptr(), copy_len) };
        unsafe { self.free(Some(old)) };
        Some(new_bp)
    }

    /// Sum of block sizes currently sitting on the free list. Useful for a
    /// harness computing utilization (`live payload / peak heap extent`);
    /// never consulted on the allocation hot path itself.
    #[must_use]
    pub fn free_bytes(&self) -> usize {
        unsafe { self.free_list.iter() }
            .map(|bp| unsafe { layout::size(bp) })
            .sum()
    }

    /// Total heap extent granted so far: `heap_hi - heap_lo + 1`.
    #[must_use]
    pub fn heap_extent(&self) -> usize {
        let lo = self.source.heap_lo() as usize;
        let hi = self.source.heap_hi() as usize;
        hi.wrapping_sub(lo).wrapping_add(1)
    }

    /// Walks the heap in address order, validating every invariant of §3.5:
    /// alignment, tag consistency, coverage, no-adjacent-frees, and
    /// free-list bijection and link symmetry. Returns the first violation
    /// found, if any.
    ///
    /// Diagnostic only; never called on an allocation hot path.
    ///
    /// # Errors
    /// Returns the first [`CheckHeapError`] variant encountered while
    /// walking the heap in address order.
    pub fn check_heap(&self) -> Result<(), CheckHeapError> {
        let lo = self.source.heap_lo();
        let hi = self.source.heap_hi();

        let mut bp = unsafe { NonNull::new_unchecked(lo.wrapping_add(TAG_SIZE)) };
        let mut covered = 0usize;
        let mut prev_was_free = false;
        let mut free_blocks_seen = 0usize;

        loop {
            if (bp.as_ptr() as usize) % ALIGNMENT != 0 {
                return Err(CheckHeapError::Misaligned {
                    addr: bp.as_ptr() as usize,
                });
            }

            let size = unsafe { layout::size(bp) };
            if size == 0 {
                covered += TAG_SIZE;
                break;
            }

            if !unsafe { layout::tags_consistent(bp, size) } {
                return Err(CheckHeapError::TagMismatch {
                    addr: bp.as_ptr() as usize,
                });
            }

            let is_alloc = unsafe { layout::is_allocated(bp) };
            if !is_alloc {
                if prev_was_free {
                    return Err(CheckHeapError::AdjacentFreeBlocks {
                        first: unsafe { layout::prev_block(bp) }.as_ptr() as usize,
                        second: bp.as_ptr() as usize,
                    });
                }
                if !unsafe { self.free_list.iter() }.any(|n| n == bp) {
                    return Err(CheckHeapError::FreeListMembershipMismatch {
                        addr: bp.as_ptr() as usize,
                    });
                }
                free_blocks_seen += 1;
            }

            prev_was_free = !is_alloc;
            covered += size;
            bp = unsafe { layout::next_block(bp) };
        }

        let free_list_len = unsafe { self.free_list.iter() }.count();
        if free_list_len != free_blocks_seen {
            let addr = unsafe { self.free_list.iter() }
                .next()
                .map_or(0, |bp| bp.as_ptr() as usize);
            return Err(CheckHeapError::FreeListMembershipMismatch { addr });
        }

        let expected = (hi as usize).wrapping_sub(lo as usize).wrapping_add(1);
        if covered != expected {
            return Err(CheckHeapError::CoverageMismatch {
                observed: covered,
                expected,
            });
        }

        for bp in unsafe { self.free_list.iter() } {
            if let Some(next) = unsafe { free_list::next_link(bp) } {
                if unsafe { free_list::prev_link(next) } != Some(bp) {
                    return Err(CheckHeapError::LinkAsymmetry {
                        addr: bp.as_ptr() as usize,
                    });
                }
            }
        }

        Ok(())
    }
}
