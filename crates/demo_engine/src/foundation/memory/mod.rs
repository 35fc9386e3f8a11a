//! Memory management utilities
//!
//! Command buffers never talk to the system allocator directly. They go
//! through [`CommandAllocator`], which two allocators implement:
//!
//! - [`Arena`]: bump allocation over a fixed byte range. No per-allocation
//!   free; [`Arena::reset`] rewinds everything at once. Suited to data that
//!   lives exactly as long as one scope (building a resource's static
//!   command buffers, one frame's scratch).
//! - [`HeapAllocator`]: first-fit free list over heap blocks. Grows from the
//!   system heap when nothing on the free list fits and recycles freed
//!   blocks in LIFO order.
//!
//! Both hand out small `Copy` handles instead of pointers; the bytes behind
//! a handle are reached through [`CommandAllocator::bytes`] and
//! [`CommandAllocator::bytes_mut`].

mod arena;
mod heap;

pub use arena::{Arena, ArenaBlock, ARENA_ALIGN};
pub use heap::{HeapAllocator, HeapBlock, HeapStats};

use std::fmt::Debug;
use thiserror::Error;

/// Errors produced by the command allocators
///
/// None of these are retried. Exhaustion means the caller's memory budget
/// is wrong; the handle errors mean a buffer outlived its allocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// The arena does not have enough space left for the request
    #[error("Arena exhausted: requested {requested} bytes, {remaining} remaining")]
    ArenaExhausted {
        /// Bytes requested
        requested: usize,
        /// Bytes still available in the arena
        remaining: usize,
    },

    /// The system heap could not satisfy a new block
    #[error("Heap exhausted: could not reserve {requested} bytes")]
    HeapExhausted {
        /// Bytes requested
        requested: usize,
    },

    /// The handle was issued before the last arena reset
    #[error("Stale arena block (generation {block}, arena is at {current})")]
    StaleBlock {
        /// Generation stamped on the handle
        block: u32,
        /// Current arena generation
        current: u32,
    },

    /// The block was already returned to the free list
    #[error("Block deallocated twice")]
    DoubleFree,

    /// The handle does not refer to a live block of this allocator
    #[error("Invalid block handle")]
    InvalidBlock,
}

/// Allocation interface used by command buffers
///
/// Blocks are addressed through handles. A handle stays valid until it is
/// passed to [`deallocate`](Self::deallocate) or replaced by
/// [`reallocate`](Self::reallocate); for an arena, also until the next reset.
pub trait CommandAllocator {
    /// Handle type identifying one allocation
    type Block: Copy + Eq + Debug;

    /// Allocate a block of at least `size` bytes
    fn allocate(&mut self, size: usize) -> Result<Self::Block, AllocError>;

    /// Grow a block to at least `new_size` bytes, preserving its contents
    ///
    /// Returns the same handle when the block already covers `new_size`.
    /// Blocks are never shrunk.
    fn reallocate(&mut self, block: Self::Block, new_size: usize) -> Result<Self::Block, AllocError>;

    /// Return a block to the allocator
    fn deallocate(&mut self, block: Self::Block) -> Result<(), AllocError>;

    /// Read access to the bytes of a block
    fn bytes(&self, block: Self::Block) -> Result<&[u8], AllocError>;

    /// Write access to the bytes of a block
    fn bytes_mut(&mut self, block: Self::Block) -> Result<&mut [u8], AllocError>;
}
