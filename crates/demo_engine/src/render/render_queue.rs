//! # Render Queue System
//!
//! Collects one frame's draw calls and turns them into the shortest command
//! stream that produces the same GPU state at every draw.
//!
//! ## Architecture
//!
//! - **RenderItem**: sort key + draw command + ordered list of state layers
//!   (command buffer views, applied first to last before the draw)
//! - **RenderQueue**: stores items, sorts them, deduplicates state and
//!   forwards the result
//! - **CommandSink**: what happens to an emitted command, either a backend
//!   call (immediate dispatch) or an append to a flattened command buffer
//!   (buffered dispatch)
//!
//! ## Flush algorithm
//!
//! 1. Sort items by key. With [`SortPolicy::Stable`] equal keys keep their
//!    submission order.
//! 2. Forget the last emitted command of every kind.
//! 3. Per item, decode its layers' records in order. A state record whose
//!    slot is rewritten later in the same item is shadowed and skipped,
//!    unless a record in between reads that slot (any direct command, or a
//!    uniform value for the bound program). Every other record is emitted
//!    when it is direct, when nothing of its kind was emitted yet this
//!    flush, or when it differs from the last emitted command of its kind.
//!    Otherwise it is skipped. Emitting a program bind forgets the last
//!    uniform values, since they were written to the previous program.
//! 4. Emit the item's draw command.
//! 5. Drop all items.
//!
//! The queue never owns the buffers behind its layers. Producers keep them
//! alive (and unchanged) until the flush that consumes the item.

use std::fmt::Debug;
use std::ops::Range;

use crate::core::config::{ConfigError, RenderQueueConfig, SortPolicy};
use crate::foundation::memory::CommandAllocator;
use super::api::RenderBackend;
use super::command_buffer::{grown_capacity, BufferView, CommandBuffer};
use super::commands::{Command, CommandKind, StateSlot, COMMAND_KIND_COUNT};
use super::{RenderError, RenderResult};

/// Counters for one flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Items processed
    pub items: usize,
    /// State-layer records forwarded
    pub executed: usize,
    /// State-layer records dropped as redundant
    pub skipped: usize,
    /// Draw commands forwarded (one per item)
    pub draws: usize,
}

impl FlushStats {
    /// Every command forwarded, state and draws
    pub const fn emitted(&self) -> usize {
        self.executed + self.draws
    }
}

/// One submitted draw call
#[derive(Debug, Clone)]
struct RenderItem {
    key: u64,
    draw: Command,
    /// Range into the queue's layer storage
    layers: Range<usize>,
}

/// Destination of emitted commands
trait CommandSink {
    fn emit(&mut self, command: &Command) -> RenderResult<()>;
}

struct BackendSink<'a, R: ?Sized> {
    backend: &'a mut R,
}

impl<R: RenderBackend + ?Sized> CommandSink for BackendSink<'_, R> {
    fn emit(&mut self, command: &Command) -> RenderResult<()> {
        log::trace!("emit {:?}", command);
        command.apply(self.backend);
        Ok(())
    }
}

struct BufferSink<'a, O: CommandAllocator> {
    allocator: &'a mut O,
    buffer: &'a mut CommandBuffer<O::Block>,
}

impl<O: CommandAllocator> CommandSink for BufferSink<'_, O> {
    fn emit(&mut self, command: &Command) -> RenderResult<()> {
        self.buffer.push_command(self.allocator, *command)?;
        Ok(())
    }
}

/// Per-frame collection of render items with state deduplication
#[derive(Debug)]
pub struct RenderQueue<B> {
    config: RenderQueueConfig,
    items: Vec<RenderItem>,
    layers: Vec<BufferView<B>>,

    /// Last command of each kind emitted during the current flush
    previous: [Option<Command>; COMMAND_KIND_COUNT],

    // Per-item scratch, reused across items and frames
    records: Vec<Command>,
    shadowed: Vec<bool>,
    live_slots: Vec<StateSlot>,

    last_stats: FlushStats,
}

impl<B: Copy + Eq + Debug> RenderQueue<B> {
    /// Create a queue with the default configuration
    pub fn new() -> Self {
        Self::build(RenderQueueConfig::default())
    }

    /// Create a queue from a validated configuration
    pub fn with_config(config: RenderQueueConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RenderQueueConfig) -> Self {
        Self {
            items: Vec::with_capacity(config.initial_item_capacity),
            layers: Vec::with_capacity(config.initial_item_capacity * 2),
            previous: [None; COMMAND_KIND_COUNT],
            records: Vec::new(),
            shadowed: Vec::new(),
            live_slots: Vec::new(),
            last_stats: FlushStats::default(),
            config,
        }
    }

    /// Queue one draw call
    ///
    /// `state` lists the layers to apply before the draw, lowest priority
    /// first (e.g. global, instance, model, material, mesh). `draw` must be
    /// a direct command. Over-deep state stacks are rejected, never
    /// truncated.
    pub fn submit(
        &mut self,
        key: impl Into<u64>,
        draw: impl Into<Command>,
        state: &[BufferView<B>],
    ) -> RenderResult<()> {
        let draw = draw.into();
        if !draw.is_direct() {
            log::warn!("Rejected submission: {} is not a draw command", draw.kind().name());
            return Err(RenderError::NotADrawCommand { kind: draw.kind() });
        }

        let max = self.config.max_state_layers;
        if state.len() > max {
            log::warn!(
                "Rejected submission: {} state layers exceeds limit of {}",
                state.len(),
                max
            );
            return Err(RenderError::StateStackOverflow {
                depth: state.len(),
                max,
            });
        }

        reserve_grown(&mut self.layers, state.len());
        let start = self.layers.len();
        self.layers.extend_from_slice(state);

        reserve_grown(&mut self.items, 1);
        self.items.push(RenderItem {
            key: key.into(),
            draw,
            layers: start..self.layers.len(),
        });
        Ok(())
    }

    /// Flush, sending emitted commands straight to `backend`
    pub fn send_to_backend<A, R>(&mut self, allocator: &A, backend: &mut R) -> RenderResult<FlushStats>
    where
        A: CommandAllocator<Block = B>,
        R: RenderBackend + ?Sized,
    {
        self.flush_into(allocator, &mut BackendSink { backend })
    }

    /// Flush, appending emitted commands to `output` for later replay
    ///
    /// `output` may live in a different allocator than the submitted
    /// layers. Existing records in `output` are kept.
    pub fn send_to_command_buffer<A, O>(
        &mut self,
        allocator: &A,
        output_allocator: &mut O,
        output: &mut CommandBuffer<O::Block>,
    ) -> RenderResult<FlushStats>
    where
        A: CommandAllocator<Block = B>,
        O: CommandAllocator,
    {
        self.flush_into(
            allocator,
            &mut BufferSink {
                allocator: output_allocator,
                buffer: output,
            },
        )
    }

    /// Flush into a new buffer sized by `initial_output_capacity`
    pub fn flatten<A, O>(&mut self, allocator: &A, output_allocator: &mut O) -> RenderResult<CommandBuffer<O::Block>>
    where
        A: CommandAllocator<Block = B>,
        O: CommandAllocator,
    {
        let mut output = CommandBuffer::create(output_allocator, self.config.initial_output_capacity)?;
        if let Err(err) = self.send_to_command_buffer(allocator, output_allocator, &mut output) {
            output.destroy(output_allocator)?;
            return Err(err);
        }
        Ok(output)
    }

    /// Drop pending items without emitting anything
    pub fn clear(&mut self) {
        self.items.clear();
        self.layers.clear();
    }

    /// Number of pending items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no items are pending
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Counters from the most recent successful flush
    pub const fn last_stats(&self) -> FlushStats {
        self.last_stats
    }

    /// Active configuration
    pub const fn config(&self) -> &RenderQueueConfig {
        &self.config
    }

    fn flush_into<A, S>(&mut self, allocator: &A, sink: &mut S) -> RenderResult<FlushStats>
    where
        A: CommandAllocator<Block = B>,
        S: CommandSink,
    {
        match self.config.sort_policy {
            SortPolicy::Stable => self.items.sort_by_key(|item| item.key),
            SortPolicy::Unstable => self.items.sort_unstable_by_key(|item| item.key),
        }

        self.previous = [None; COMMAND_KIND_COUNT];
        let mut stats = FlushStats {
            items: self.items.len(),
            ..FlushStats::default()
        };

        let mut items = std::mem::take(&mut self.items);
        let outcome = items
            .iter()
            .try_for_each(|item| self.process_item(item, allocator, sink, &mut stats));

        // Items are consumed even when the flush fails part way.
        items.clear();
        self.items = items;
        self.layers.clear();
        outcome?;

        log::debug!(
            "Render queue flush: {} items, {} state commands executed, {} skipped, {} draws",
            stats.items,
            stats.executed,
            stats.skipped,
            stats.draws
        );
        self.last_stats = stats;
        Ok(stats)
    }

    fn process_item<A, S>(
        &mut self,
        item: &RenderItem,
        allocator: &A,
        sink: &mut S,
        stats: &mut FlushStats,
    ) -> RenderResult<()>
    where
        A: CommandAllocator<Block = B>,
        S: CommandSink,
    {
        self.records.clear();
        for index in item.layers.clone() {
            let view = self.layers[index];
            for record in view.records(allocator)? {
                self.records.push(record?);
            }
        }

        self.mark_shadowed();

        for (command, &shadowed) in self.records.iter().zip(&self.shadowed) {
            if shadowed {
                stats.skipped += 1;
                continue;
            }

            let kind = command.kind();
            let last = &mut self.previous[kind as usize];
            if command.is_direct() || last.as_ref() != Some(command) {
                sink.emit(command)?;
                *last = Some(*command);
                stats.executed += 1;

                // Values written through the old state no longer apply.
                for dependent in CommandKind::ALL {
                    if dependent.observes() == Some(kind) {
                        self.previous[dependent as usize] = None;
                    }
                }
            } else {
                stats.skipped += 1;
            }
        }

        sink.emit(&item.draw)?;
        stats.draws += 1;
        Ok(())
    }

    /// Flag state records that a later record of the same item overrides
    fn mark_shadowed(&mut self) {
        self.shadowed.clear();
        self.shadowed.resize(self.records.len(), false);
        if !self.config.eliminate_shadowed_state {
            return;
        }

        // Walk backwards; a direct command observes the state set before
        // it, so it ends every override run.
        self.live_slots.clear();
        for (index, command) in self.records.iter().enumerate().rev() {
            if command.is_direct() {
                self.live_slots.clear();
                continue;
            }
            if let Some(slot) = command.state_slot() {
                if self.live_slots.contains(&slot) {
                    self.shadowed[index] = true;
                } else {
                    self.live_slots.push(slot);
                }
            }
            // A record that reads another slot ends that slot's run too.
            if let Some(observed) = command.observed_slot() {
                self.live_slots.retain(|slot| *slot != observed);
            }
        }
    }
}

impl<B: Copy + Eq + Debug> Default for RenderQueue<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// Make room for `additional` elements, growing by at least 1.5x
fn reserve_grown<T>(storage: &mut Vec<T>, additional: usize) {
    let needed = storage.len() + additional;
    if needed > storage.capacity() {
        let target = grown_capacity(storage.capacity()).max(needed);
        storage.reserve_exact(target - storage.len());
    }
}
