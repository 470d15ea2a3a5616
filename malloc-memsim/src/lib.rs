//! A host-side `sbrk` simulator: [`MemSim`] implements
//! [`malloc_core::MemorySource`] over a fixed-capacity backing arena with a
//! monotonically advancing break pointer.
//!
//! This is the "external memory primitive" collaborator — the thing a real
//! kernel would provide via page faults, stood in here by a plain buffer so
//! the core allocator can be exercised and benchmarked without an OS.

use std::ptr::NonNull;

use malloc_core::{MemoryError, MemorySource};

/// Default arena size: large enough for the allocator's default initial
/// extension (`CHUNKSIZE`) plus headroom for a handful of traces.
pub const DEFAULT_CAPACITY: usize = 16 * 1024 * 1024;

/// Backing storage is `u64`-typed rather than `u8` purely to guarantee
/// 8-byte alignment of the base address, per [`MemorySource`]'s contract —
/// the allocator never reads or writes through this type itself.
pub struct MemSim {
    storage: Box<[u64]>,
    capacity_bytes: usize,
    brk: usize,
}

impl MemSim {
    /// Allocates a fresh arena of at least `capacity_bytes` bytes.
    #[must_use]
    pub fn with_capacity(capacity_bytes: usize) -> Self {
        let words = capacity_bytes.div_ceil(8);
        let storage = vec![0u64; words].into_boxed_slice();
        let capacity_bytes = words * 8;
        log::debug!("memsim arena allocated: {capacity_bytes} bytes");
        Self {
            storage,
            capacity_bytes,
            brk: 0,
        }
    }

    fn base(&self) -> *mut u8 {
        self.storage.as_ptr().cast_mut().cast()
    }
}

impl Default for MemSim {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

// SAFETY: `storage` is never moved or resized after construction (`reset`
// only rewinds `brk`), so every pointer handed out via `grow` stays valid
// for the lifetime of `self`. The base address is 8-byte aligned because
// `storage` is a `u64` slice.
unsafe impl MemorySource for MemSim {
    fn grow(&mut self, bytes: usize) -> Result<NonNull<u8>, MemoryError> {
        let new_brk = self.brk.checked_add(bytes).ok_or(MemoryError::OutOfMemory {
            requested: bytes,
        })?;
        if new_brk > self.capacity_bytes {
            return Err(MemoryError::OutOfMemory { requested: bytes });
        }
        // SAFETY: `self.brk + bytes <= capacity_bytes`, so this stays
        // within `storage`'s allocation.
        let ptr = unsafe { self.base().add(self.brk) };
        self.brk = new_brk;
        Ok(unsafe { NonNull::new_unchecked(ptr) })
    }

    fn heap_lo(&self) -> *mut u8 {
        self.base()
    }

    fn heap_hi(&self) -> *mut u8 {
        // Before the first successful `grow`, this sits one byte below
        // `heap_lo`, matching the trait's documented pre-growth state.
        self.base().wrapping_add(self.brk).wrapping_sub(1)
    }

    fn reset(&mut self) {
        self.storage.fill(0);
        self.brk = 0;
        log::debug!("memsim arena reset");
    }
}
