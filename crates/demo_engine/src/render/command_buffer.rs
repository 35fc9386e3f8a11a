//! # Command Buffer
//!
//! An append-only sequence of command records stored in one allocation.
//! Every record occupies a fixed [`SLOT_SIZE`] slot regardless of its kind,
//! so record `i` lives at byte `i * SLOT_SIZE` and can be read back in O(1).
//!
//! A buffer is a small header (allocation handle, length, capacity); the
//! bytes live in whichever [`CommandAllocator`] created it. Every operation
//! that touches the records takes that allocator as an argument.
//!
//! ```rust,ignore
//! let mut heap = HeapAllocator::new();
//! let mut material = CommandBuffer::create(&mut heap, 4)?;
//! material.bind_program(&mut heap, program)?;
//! material.bind_texture(&mut heap, albedo, 0)?;
//! ```

use std::fmt::Debug;
use std::slice::ChunksExact;

use crate::foundation::memory::CommandAllocator;
use super::api::RenderBackend;
use super::commands::{
    BindProgram, BindTexture, BindVertexArray, ClearColor, Command, CommandPayload, DrawArrays,
    DrawIndexed, SetViewport, SLOT_SIZE,
};
use super::{RenderError, RenderResult};

/// Capacity after one growth step: 1.5x, and always at least one more
pub const fn grown_capacity(capacity: usize) -> usize {
    let grown = capacity.saturating_mul(3) / 2;
    if grown > capacity {
        grown
    } else {
        capacity.saturating_add(1)
    }
}

/// Growable sequence of encoded command records
#[derive(Debug)]
pub struct CommandBuffer<B> {
    block: B,
    len: usize,
    capacity: usize,
}

/// Copyable snapshot of a buffer's records
///
/// The render queue stores views instead of borrowing buffers. A view
/// covers the records present when it was taken; records pushed afterwards
/// are not part of it. The buffer must not be destroyed or grown while a
/// view of it is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferView<B> {
    block: B,
    len: usize,
}

impl<B: Copy + Eq + Debug> CommandBuffer<B> {
    /// Allocate a buffer with room for `initial_capacity` records
    pub fn create<A>(allocator: &mut A, initial_capacity: usize) -> RenderResult<Self>
    where
        A: CommandAllocator<Block = B>,
    {
        let bytes = slot_bytes(initial_capacity)?;
        let block = allocator.allocate(bytes)?;
        Ok(Self {
            block,
            len: 0,
            capacity: initial_capacity,
        })
    }

    /// Return the buffer's allocation
    pub fn destroy<A>(self, allocator: &mut A) -> RenderResult<()>
    where
        A: CommandAllocator<Block = B>,
    {
        allocator.deallocate(self.block)?;
        Ok(())
    }

    /// Append a command payload, growing by 1.5x when full
    ///
    /// Returns the index of the new record.
    pub fn push<A, P>(&mut self, allocator: &mut A, payload: P) -> RenderResult<usize>
    where
        A: CommandAllocator<Block = B>,
        P: CommandPayload,
    {
        self.push_command(allocator, payload.into_command())
    }

    /// Append an already wrapped command
    pub fn push_command<A>(&mut self, allocator: &mut A, command: Command) -> RenderResult<usize>
    where
        A: CommandAllocator<Block = B>,
    {
        if self.len == self.capacity {
            self.grow(allocator)?;
        }

        let index = self.len;
        let start = index * SLOT_SIZE;
        let bytes = allocator.bytes_mut(self.block)?;
        let slot = bytes
            .get_mut(start..start + SLOT_SIZE)
            .ok_or(RenderError::IndexOutOfRange {
                index,
                len: self.capacity,
            })?;
        command.encode_into(slot)?;

        self.len += 1;
        Ok(index)
    }

    fn grow<A>(&mut self, allocator: &mut A) -> RenderResult<()>
    where
        A: CommandAllocator<Block = B>,
    {
        let capacity = grown_capacity(self.capacity);
        self.block = allocator.reallocate(self.block, slot_bytes(capacity)?)?;
        log::trace!(
            "Command buffer grew from {} to {} slots",
            self.capacity,
            capacity
        );
        self.capacity = capacity;
        Ok(())
    }

    /// Read the record at `index`
    pub fn command_at<A>(&self, allocator: &A, index: usize) -> RenderResult<Command>
    where
        A: CommandAllocator<Block = B>,
    {
        self.view().command_at(allocator, index)
    }

    /// Iterate the records in order
    pub fn iter<'a, A>(&self, allocator: &'a A) -> RenderResult<Records<'a>>
    where
        A: CommandAllocator<Block = B>,
    {
        self.view().records(allocator)
    }

    /// Apply every record to `backend`, in order
    ///
    /// Used to replay a flattened buffer, once or every frame. Returns the
    /// number of commands applied.
    pub fn replay<A, R>(&self, allocator: &A, backend: &mut R) -> RenderResult<usize>
    where
        A: CommandAllocator<Block = B>,
        R: RenderBackend + ?Sized,
    {
        let mut applied = 0;
        for command in self.iter(allocator)? {
            command?.apply(backend);
            applied += 1;
        }
        Ok(applied)
    }

    /// Snapshot of the current records
    pub fn view(&self) -> BufferView<B> {
        BufferView {
            block: self.block,
            len: self.len,
        }
    }

    /// Drop records past `len`; their slots are overwritten by later pushes
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    /// Drop every record, keeping the allocation
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Number of records
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no records
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of records that fit before the next growth
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Allocation handle backing the buffer
    pub fn block(&self) -> B {
        self.block
    }

    // Builders for the kinds producers record most; any other payload
    // goes through `push`

    /// Append [`DrawArrays`]
    pub fn draw_arrays<A>(&mut self, allocator: &mut A, first: u32, count: u32) -> RenderResult<usize>
    where
        A: CommandAllocator<Block = B>,
    {
        self.push(allocator, DrawArrays::new(first, count))
    }

    /// Append [`DrawIndexed`]
    pub fn draw_indexed<A>(
        &mut self,
        allocator: &mut A,
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
    ) -> RenderResult<usize>
    where
        A: CommandAllocator<Block = B>,
    {
        self.push(allocator, DrawIndexed::new(index_count, first_index, base_vertex))
    }

    /// Append [`ClearColor`]
    pub fn clear_color<A>(&mut self, allocator: &mut A, r: f32, g: f32, b: f32, a: f32) -> RenderResult<usize>
    where
        A: CommandAllocator<Block = B>,
    {
        self.push(allocator, ClearColor::new(r, g, b, a))
    }

    /// Append [`SetViewport`]
    pub fn set_viewport<A>(&mut self, allocator: &mut A, x: i32, y: i32, width: u32, height: u32) -> RenderResult<usize>
    where
        A: CommandAllocator<Block = B>,
    {
        self.push(allocator, SetViewport::new(x, y, width, height))
    }

    /// Append [`BindVertexArray`]
    pub fn bind_vertex_array<A>(&mut self, allocator: &mut A, handle: u32) -> RenderResult<usize>
    where
        A: CommandAllocator<Block = B>,
    {
        self.push(allocator, BindVertexArray::new(handle))
    }

    /// Append [`BindProgram`]
    pub fn bind_program<A>(&mut self, allocator: &mut A, handle: u32) -> RenderResult<usize>
    where
        A: CommandAllocator<Block = B>,
    {
        self.push(allocator, BindProgram::new(handle))
    }

    /// Append [`BindTexture`]
    pub fn bind_texture<A>(&mut self, allocator: &mut A, handle: u32, unit: u32) -> RenderResult<usize>
    where
        A: CommandAllocator<Block = B>,
    {
        self.push(allocator, BindTexture::new(handle, unit))
    }





}

impl<B: Copy + Eq + Debug> BufferView<B> {
    /// Number of records covered by the view
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the view covers no records
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read the record at `index`
    pub fn command_at<A>(&self, allocator: &A, index: usize) -> RenderResult<Command>
    where
        A: CommandAllocator<Block = B>,
    {
        if index >= self.len {
            return Err(RenderError::IndexOutOfRange {
                index,
                len: self.len,
            });
        }

        let start = index * SLOT_SIZE;
        let bytes = allocator.bytes(self.block)?;
        let slot = bytes
            .get(start..start + SLOT_SIZE)
            .ok_or(RenderError::TruncatedRecord {
                expected: start + SLOT_SIZE,
                found: bytes.len(),
            })?;
        Command::decode(slot)
    }

    /// Iterate the covered records in order
    pub fn records<'a, A>(&self, allocator: &'a A) -> RenderResult<Records<'a>>
    where
        A: CommandAllocator<Block = B>,
    {
        let bytes = allocator.bytes(self.block)?;
        let used = self.len * SLOT_SIZE;
        let slots = bytes.get(..used).ok_or(RenderError::TruncatedRecord {
            expected: used,
            found: bytes.len(),
        })?;
        Ok(Records {
            slots: slots.chunks_exact(SLOT_SIZE),
        })
    }
}

/// Iterator decoding the records of a buffer
#[derive(Debug, Clone)]
pub struct Records<'a> {
    slots: ChunksExact<'a, u8>,
}

impl Iterator for Records<'_> {
    type Item = RenderResult<Command>;

    fn next(&mut self) -> Option<Self::Item> {
        self.slots.next().map(Command::decode)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.slots.size_hint()
    }
}

impl ExactSizeIterator for Records<'_> {}

fn slot_bytes(slots: usize) -> RenderResult<usize> {
    slots
        .checked_mul(SLOT_SIZE)
        .ok_or(RenderError::CapacityOverflow { slots })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::memory::{AllocError, Arena, HeapAllocator};
    use crate::render::api::LogBackend;
    use crate::render::commands::{BlendMode, CommandKind, SetBlendMode, SetDepthState, SetUniformFloat};

    #[test]
    fn test_grown_capacity_policy() {
        assert_eq!(grown_capacity(0), 1);
        assert_eq!(grown_capacity(1), 2);
        assert_eq!(grown_capacity(2), 3);
        assert_eq!(grown_capacity(4), 6);
        assert_eq!(grown_capacity(10), 15);
    }

    #[test]
    fn test_push_and_read_back() {
        let mut heap = HeapAllocator::new();
        let mut buffer = CommandBuffer::create(&mut heap, 4).unwrap();

        assert_eq!(buffer.clear_color(&mut heap, 0.0, 0.0, 0.0, 1.0).unwrap(), 0);
        assert_eq!(buffer.bind_program(&mut heap, 7).unwrap(), 1);

        assert_eq!(buffer.len(), 2);
        assert_eq!(
            buffer.command_at(&heap, 0).unwrap(),
            Command::from(ClearColor::new(0.0, 0.0, 0.0, 1.0))
        );
        assert_eq!(buffer.command_at(&heap, 1).unwrap(), Command::from(BindProgram::new(7)));
        assert!(matches!(
            buffer.command_at(&heap, 2),
            Err(RenderError::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_growth_preserves_records() {
        let mut heap = HeapAllocator::new();
        let mut buffer = CommandBuffer::create(&mut heap, 2).unwrap();

        // 2 -> 3 -> 4 -> 6 -> 9 -> 13: five growth events.
        for i in 0..12u32 {
            buffer.bind_texture(&mut heap, 100 + i, i % 4).unwrap();
        }
        assert_eq!(buffer.len(), 12);
        assert_eq!(buffer.capacity(), 13);

        for i in 0..12u32 {
            assert_eq!(
                buffer.command_at(&heap, i as usize).unwrap(),
                Command::from(BindTexture::new(100 + i, i % 4))
            );
        }

        // Old blocks were recycled onto the free list.
        assert_eq!(heap.stats().live_blocks, 1);
    }

    #[test]
    fn test_payload_records_itself() {
        let mut heap = HeapAllocator::new();
        let mut buffer = CommandBuffer::create(&mut heap, 1).unwrap();

        assert_eq!(SetUniformFloat::new(2, 0.25).record_into(&mut buffer, &mut heap).unwrap(), 0);
        assert_eq!(SetBlendMode::new(BlendMode::Alpha).record_into(&mut buffer, &mut heap).unwrap(), 1);
        assert_eq!(
            buffer.command_at(&heap, 0).unwrap(),
            Command::from(SetUniformFloat::new(2, 0.25))
        );
    }

    #[test]
    fn test_zero_capacity_buffer_grows() {
        let mut heap = HeapAllocator::new();
        let mut buffer = CommandBuffer::create(&mut heap, 0).unwrap();
        buffer.draw_arrays(&mut heap, 0, 3).unwrap();
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.command_at(&heap, 0).unwrap(), Command::from(DrawArrays::new(0, 3)));
    }

    #[test]
    fn test_arena_backed_buffer() {
        let mut arena = Arena::new(SLOT_SIZE * 16);
        let mut buffer = CommandBuffer::create(&mut arena, 1).unwrap();

        buffer.set_viewport(&mut arena, 0, 0, 800, 600).unwrap();
        buffer.push(&mut arena, SetDepthState::new(true, true)).unwrap();
        buffer.push(&mut arena, SetBlendMode::new(BlendMode::Opaque)).unwrap();

        let kinds: Vec<CommandKind> = buffer
            .iter(&arena)
            .unwrap()
            .map(|command| command.unwrap().kind())
            .collect();
        assert_eq!(
            kinds,
            vec![CommandKind::SetViewport, CommandKind::SetDepthState, CommandKind::SetBlendMode]
        );
    }

    #[test]
    fn test_arena_exhaustion_surfaces_as_error() {
        let mut arena = Arena::new(SLOT_SIZE);
        let mut buffer = CommandBuffer::create(&mut arena, 1).unwrap();
        buffer.bind_program(&mut arena, 1).unwrap();

        let err = buffer.bind_program(&mut arena, 2).unwrap_err();
        assert!(matches!(err, RenderError::Alloc(AllocError::ArenaExhausted { .. })));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_view_is_a_snapshot() {
        let mut heap = HeapAllocator::new();
        let mut buffer = CommandBuffer::create(&mut heap, 4).unwrap();
        buffer.bind_program(&mut heap, 1).unwrap();

        let view = buffer.view();
        buffer.bind_program(&mut heap, 2).unwrap();

        assert_eq!(view.len(), 1);
        assert_eq!(view.records(&heap).unwrap().len(), 1);
        assert_eq!(buffer.view().len(), 2);
    }

    #[test]
    fn test_view_of_grown_buffer_rejects_reused_block() {
        let mut heap = HeapAllocator::new();
        let mut first = CommandBuffer::create(&mut heap, 1).unwrap();
        first.bind_program(&mut heap, 1).unwrap();
        let view = first.view();

        // Growing frees the original block; a new buffer then takes it over.
        first.bind_program(&mut heap, 2).unwrap();
        let mut second = CommandBuffer::create(&mut heap, 1).unwrap();
        second.bind_program(&mut heap, 99).unwrap();

        assert!(matches!(
            view.command_at(&heap, 0),
            Err(RenderError::Alloc(AllocError::InvalidBlock))
        ));
        assert_eq!(second.command_at(&heap, 0).unwrap(), Command::from(BindProgram::new(99)));
        assert_eq!(first.command_at(&heap, 0).unwrap(), Command::from(BindProgram::new(1)));
    }

    #[test]
    fn test_truncate_then_overwrite() {
        let mut heap = HeapAllocator::new();
        let mut buffer = CommandBuffer::create(&mut heap, 4).unwrap();
        buffer.bind_program(&mut heap, 1).unwrap();
        buffer.bind_program(&mut heap, 2).unwrap();

        buffer.truncate(1);
        buffer.bind_vertex_array(&mut heap, 9).unwrap();

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.command_at(&heap, 1).unwrap(), Command::from(BindVertexArray::new(9)));

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 4);
    }

    #[test]
    fn test_replay_applies_every_record() {
        let mut heap = HeapAllocator::new();
        let mut buffer = CommandBuffer::create(&mut heap, 4).unwrap();
        buffer.bind_program(&mut heap, 1).unwrap();
        buffer.bind_program(&mut heap, 1).unwrap();
        buffer.draw_indexed(&mut heap, 36, 0, 0).unwrap();

        let mut backend = LogBackend::new();
        assert_eq!(buffer.replay(&heap, &mut backend).unwrap(), 3);
        // Replay does not deduplicate.
        assert_eq!(backend.calls(CommandKind::BindProgram), 2);
        assert_eq!(backend.calls(CommandKind::DrawIndexed), 1);
    }

    #[test]
    fn test_destroy_returns_allocation() {
        let mut heap = HeapAllocator::new();
        let buffer = CommandBuffer::create(&mut heap, 8).unwrap();
        let block = buffer.block();
        buffer.destroy(&mut heap).unwrap();

        assert_eq!(heap.stats().free_blocks, 1);
        assert!(heap.bytes(block).is_err());
    }

    #[test]
    fn test_corrupt_slot_is_reported() {
        let mut heap = HeapAllocator::new();
        let mut buffer = CommandBuffer::create(&mut heap, 2).unwrap();
        buffer.bind_program(&mut heap, 1).unwrap();
        heap.bytes_mut(buffer.block()).unwrap()[0] = 0xFF;

        assert!(matches!(
            buffer.command_at(&heap, 0),
            Err(RenderError::UnknownCommand(0xFF))
        ));
    }
}
