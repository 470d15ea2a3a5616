//! Error taxonomy for the allocator and its collaborators.
//!
//! Per the error handling design, resource exhaustion is the only error a
//! client ever observes, and it is surfaced as `null`/`-1` at the public API
//! rather than as a `Result`. These types exist for the collaborators
//! (`MemorySource`) and the diagnostic checker, which do return `Result`.

/// Failure to extend the backing memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    /// The memory primitive refused to grow the region further.
    #[error("memory primitive refused to grow by {requested} bytes")]
    OutOfMemory {
        /// The number of bytes that were requested.
        requested: usize,
    },
}

/// A single violation of one of the heap invariants, as found by
/// [`crate::heap::Allocator::check_heap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CheckHeapError {
    /// A payload pointer was not 8-byte aligned.
    #[error("block at {addr:#x} is not 8-byte aligned")]
    Misaligned {
        /// Address of the offending block pointer.
        addr: usize,
    },
    /// A block's header and footer disagree.
    #[error("block at {addr:#x} has mismatched header/footer tags")]
    TagMismatch {
        /// Address of the offending block pointer.
        addr: usize,
    },
    /// The sum of block sizes does not cover the heap exactly.
    #[error("heap coverage mismatch: blocks sum to {observed}, heap spans {expected}")]
    CoverageMismatch {
        /// Sum of block sizes actually walked.
        observed: usize,
        /// Size implied by `heap_hi - heap_lo + 1`.
        expected: usize,
    },
    /// Two physically adjacent blocks were both free.
    #[error("blocks at {first:#x} and {second:#x} are adjacent and both free")]
    AdjacentFreeBlocks {
        /// Address of the first block pointer.
        first: usize,
        /// Address of the second block pointer.
        second: usize,
    },
    /// A free block's `next_free` link does not point back via `prev_free`.
    #[error("free-list link asymmetry at {addr:#x}")]
    LinkAsymmetry {
        /// Address of the offending block pointer.
        addr: usize,
    },
    /// A block reachable by address-order traversal is free but never
    /// appeared in the free-list walk (or vice versa).
    #[error("block at {addr:#x} is free but absent from the free list")]
    FreeListMembershipMismatch {
        /// Address of the offending block pointer.
        addr: usize,
    },
}
