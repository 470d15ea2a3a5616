//! An explicit free-list, first-fit, immediate-coalescing heap allocator
//! with boundary-tagged blocks.
//!
//! The allocator is generic over [`MemorySource`], the `sbrk`-style
//! collaborator that grants it contiguous memory to manage; this crate
//! never talks to the operating system or a global allocator directly.
//! Everything else — block layout, the free-list discipline, placement,
//! and reclamation — is implemented here.
//!
//! Single-writer model: nothing in this crate synchronizes concurrent
//! access. An [`Allocator`] is `Send` but not `Sync`; sharing one across
//! threads requires external locking.
#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod error;
pub mod free_list;
pub mod heap;
pub mod layout;
pub mod mem_source;
pub mod placement;
pub mod reclamation;

pub use error::{CheckHeapError, MemoryError};
pub use heap::{Allocator, CHUNKSIZE};
pub use mem_source::MemorySource;
