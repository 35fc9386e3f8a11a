//! Free-list allocator over system heap blocks

use slotmap::{new_key_type, SlotMap};

use super::{AllocError, CommandAllocator};

new_key_type! {
    /// Handle to a block owned by a [`HeapAllocator`]
    pub struct HeapBlock;
}

#[derive(Debug)]
struct Block {
    /// `data.len()` is the block's recorded size
    data: Vec<u8>,
    free: bool,
}

/// Snapshot of allocator occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Blocks currently handed out
    pub live_blocks: usize,
    /// Blocks waiting on the free list
    pub free_blocks: usize,
    /// Bytes held from the system heap, live and free
    pub reserved_bytes: usize,
}

/// Growable allocator with a first-fit free list
///
/// Allocation walks the free list from its head (the most recently freed
/// block) and takes the first block whose recorded size covers the request.
/// When none fits, a new block of exactly the requested size is taken from
/// the system heap. Freed blocks go back on the head of the list, so reuse
/// is LIFO. Block sizes never change once created.
///
/// A reused block is handed out under a new [`HeapBlock`], so handles kept
/// past `deallocate` fail with [`AllocError::InvalidBlock`] instead of
/// reaching the next owner's bytes.
#[derive(Debug, Default)]
pub struct HeapAllocator {
    blocks: SlotMap<HeapBlock, Block>,
    /// Head of the list is the last element
    free_list: Vec<HeapBlock>,
    reserved_bytes: usize,
}

impl HeapAllocator {
    /// Create an empty allocator
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded size of a live block
    pub fn block_size(&self, block: HeapBlock) -> Result<usize, AllocError> {
        self.live(block).map(|b| b.data.len())
    }

    /// Current occupancy
    pub fn stats(&self) -> HeapStats {
        HeapStats {
            live_blocks: self.blocks.len() - self.free_list.len(),
            free_blocks: self.free_list.len(),
            reserved_bytes: self.reserved_bytes,
        }
    }

    /// Give every block on the free list back to the system heap
    ///
    /// Returns the number of bytes released.
    pub fn release_free_blocks(&mut self) -> usize {
        let mut released = 0;
        for key in self.free_list.drain(..) {
            if let Some(block) = self.blocks.remove(key) {
                released += block.data.len();
            }
        }
        self.reserved_bytes -= released;
        released
    }

    fn live(&self, block: HeapBlock) -> Result<&Block, AllocError> {
        match self.blocks.get(block) {
            Some(b) if !b.free => Ok(b),
            _ => Err(AllocError::InvalidBlock),
        }
    }

    fn live_mut(&mut self, block: HeapBlock) -> Result<&mut Block, AllocError> {
        match self.blocks.get_mut(block) {
            Some(b) if !b.free => Ok(b),
            _ => Err(AllocError::InvalidBlock),
        }
    }

    fn take_first_fit(&mut self, size: usize) -> Option<HeapBlock> {
        let blocks = &self.blocks;
        let position = self
            .free_list
            .iter()
            .rposition(|&key| blocks.get(key).is_some_and(|b| b.data.len() >= size))?;

        // Re-insert under a fresh key so handles to the freed block stay dead.
        let stale = self.free_list.remove(position);
        let block = self.blocks.remove(stale)?;
        Some(self.blocks.insert(Block {
            data: block.data,
            free: false,
        }))
    }

    fn grow(&mut self, size: usize) -> Result<HeapBlock, AllocError> {
        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| AllocError::HeapExhausted { requested: size })?;
        data.resize(size, 0);

        self.reserved_bytes += size;
        let key = self.blocks.insert(Block { data, free: false });
        log::trace!(
            "Heap allocator grew by {} bytes ({} reserved, {} blocks)",
            size,
            self.reserved_bytes,
            self.blocks.len()
        );
        Ok(key)
    }
}

impl CommandAllocator for HeapAllocator {
    type Block = HeapBlock;

    fn allocate(&mut self, size: usize) -> Result<HeapBlock, AllocError> {
        match self.take_first_fit(size) {
            Some(key) => Ok(key),
            None => self.grow(size),
        }
    }

    fn reallocate(&mut self, block: HeapBlock, new_size: usize) -> Result<HeapBlock, AllocError> {
        let old_size = self.block_size(block)?;
        if old_size >= new_size {
            return Ok(block);
        }

        let grown = self.allocate(new_size)?;
        let old = std::mem::take(&mut self.live_mut(block)?.data);
        self.live_mut(grown)?.data[..old_size].copy_from_slice(&old);
        self.live_mut(block)?.data = old;

        self.deallocate(block)?;
        Ok(grown)
    }

    fn deallocate(&mut self, block: HeapBlock) -> Result<(), AllocError> {
        let entry = self.blocks.get_mut(block).ok_or(AllocError::InvalidBlock)?;
        if entry.free {
            return Err(AllocError::DoubleFree);
        }
        entry.free = true;
        self.free_list.push(block);
        Ok(())
    }

    fn bytes(&self, block: HeapBlock) -> Result<&[u8], AllocError> {
        self.live(block).map(|b| b.data.as_slice())
    }

    fn bytes_mut(&mut self, block: HeapBlock) -> Result<&mut [u8], AllocError> {
        self.live_mut(block).map(|b| b.data.as_mut_slice())
    }
}

impl Drop for HeapAllocator {
    fn drop(&mut self) {
        let stats = self.stats();
        if stats.live_blocks > 0 {
            log::debug!(
                "Heap allocator dropped with {} live blocks ({} bytes reserved)",
                stats.live_blocks,
                stats.reserved_bytes
            );
        }
    }
}
