//! Bump allocator over a fixed byte range

use super::{AllocError, CommandAllocator};

/// Alignment applied to every arena allocation
///
/// Command records only contain 4-byte fields, so 4 keeps every slot
/// naturally aligned.
pub const ARENA_ALIGN: usize = 4;

/// Handle to a range of arena memory
///
/// The generation ties the handle to one arena epoch; after
/// [`Arena::reset`] the handle is rejected instead of silently aliasing
/// newer allocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaBlock {
    offset: usize,
    len: usize,
    generation: u32,
}

impl ArenaBlock {
    /// Byte offset of the block from the start of the arena
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Size of the block in bytes
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the block is zero-sized
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Arena epoch the block was allocated in
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    const fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Bump-pointer allocator
///
/// The backing range is sized once at construction and never grows.
/// Allocation advances a cursor; individual allocations cannot be freed.
#[derive(Debug)]
pub struct Arena {
    buffer: Box<[u8]>,
    cursor: usize,
    generation: u32,
}

impl Arena {
    /// Create an arena over `size` zeroed bytes
    pub fn new(size: usize) -> Self {
        Self {
            buffer: vec![0u8; size].into_boxed_slice(),
            cursor: 0,
            generation: 0,
        }
    }

    /// Allocate the next `size` bytes
    ///
    /// Fails with [`AllocError::ArenaExhausted`] when the remaining space
    /// (after alignment) is too small. The cursor does not move on failure.
    pub fn allocate(&mut self, size: usize) -> Result<ArenaBlock, AllocError> {
        let start = align_up(self.cursor, ARENA_ALIGN);
        let end = start
            .checked_add(size)
            .filter(|&end| end <= self.buffer.len())
            .ok_or(AllocError::ArenaExhausted {
                requested: size,
                remaining: self.remaining(),
            })?;

        self.cursor = end;
        Ok(ArenaBlock {
            offset: start,
            len: size,
            generation: self.generation,
        })
    }

    /// Rewind the cursor to the start of the range
    ///
    /// Memory is left untouched. Every block handed out before the reset
    /// becomes stale.
    pub fn reset(&mut self) {
        log::trace!(
            "Arena reset: {} of {} bytes were in use",
            self.cursor,
            self.buffer.len()
        );
        self.cursor = 0;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Bytes consumed since construction or the last reset
    pub const fn memory_used(&self) -> usize {
        self.cursor
    }

    /// Total size of the backing range
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes still available, ignoring alignment padding
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    fn check(&self, block: ArenaBlock) -> Result<(), AllocError> {
        if block.generation != self.generation {
            return Err(AllocError::StaleBlock {
                block: block.generation,
                current: self.generation,
            });
        }
        if block.end() > self.cursor {
            return Err(AllocError::InvalidBlock);
        }
        Ok(())
    }
}

impl CommandAllocator for Arena {
    type Block = ArenaBlock;

    fn allocate(&mut self, size: usize) -> Result<ArenaBlock, AllocError> {
        Arena::allocate(self, size)
    }

    /// The most recent allocation is extended in place when room allows;
    /// anything else is copied into a fresh allocation and the old range
    /// stays consumed until the next reset.
    fn reallocate(&mut self, block: ArenaBlock, new_size: usize) -> Result<ArenaBlock, AllocError> {
        self.check(block)?;
        if block.len >= new_size {
            return Ok(block);
        }

        let in_place_end = block.offset.checked_add(new_size);
        if block.end() == self.cursor {
            if let Some(end) = in_place_end.filter(|&end| end <= self.buffer.len()) {
                self.cursor = end;
                return Ok(ArenaBlock { len: new_size, ..block });
            }
        }

        let grown = Arena::allocate(self, new_size)?;
        self.buffer
            .copy_within(block.offset..block.end(), grown.offset);
        Ok(grown)
    }

    fn deallocate(&mut self, block: ArenaBlock) -> Result<(), AllocError> {
        self.check(block)
    }

    fn bytes(&self, block: ArenaBlock) -> Result<&[u8], AllocError> {
        self.check(block)?;
        Ok(&self.buffer[block.offset..block.end()])
    }

    fn bytes_mut(&mut self, block: ArenaBlock) -> Result<&mut [u8], AllocError> {
        self.check(block)?;
        Ok(&mut self.buffer[block.offset..block.end()])
    }
}

const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}
