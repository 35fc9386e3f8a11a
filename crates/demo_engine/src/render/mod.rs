//! # Rendering System
//!
//! Command recording and submission layer between scene code and the
//! graphics device.
//!
//! ## Architecture
//!
//! - **Commands**: closed set of fixed-layout command payloads and their
//!   registry ([`commands`])
//! - **Command Buffer**: growable sequence of encoded records living in a
//!   pluggable allocator ([`command_buffer`])
//! - **Render Queue**: per-frame sort, state deduplication and dispatch
//!   ([`render_queue`])
//! - **Backend**: one call per command kind, implemented by the device
//!   wrapper ([`api`])
//!
//! ## Frame Flow
//!
//! ```rust,ignore
//! let mut queue = RenderQueue::new();
//! queue.submit(SortKey::new(0, depth, material_id), DrawIndexed::new(36, 0, 0), &[
//!     global.view(),
//!     material.view(),
//! ])?;
//! queue.send_to_backend(&heap, &mut device)?;
//! ```

pub mod api;
pub mod command_buffer;
pub mod commands;
pub mod render_queue;
pub mod sort_key;

pub use api::{LogBackend, RenderBackend};
pub use command_buffer::{BufferView, CommandBuffer, Records};
pub use commands::{
    BlendMode, ClearMask, Command, CommandInfo, CommandKind, CommandPayload, StateSlot,
    COMMAND_KIND_COUNT, COMMAND_TABLE, SLOT_SIZE,
};
pub use render_queue::{FlushStats, RenderQueue};
pub use sort_key::SortKey;

use thiserror::Error;

use crate::foundation::memory::AllocError;

/// Errors raised while recording, reading or flushing commands
#[derive(Debug, Error)]
pub enum RenderError {
    /// The backing allocator refused an operation
    ///
    /// Out-of-memory on growth, or a buffer whose block was invalidated by
    /// an arena reset or a release.
    #[error("Allocation failed: {0}")]
    Alloc(#[from] AllocError),

    /// A record carries an id outside the command registry
    ///
    /// The stream is corrupt; decoding stops instead of skipping the record.
    #[error("Unknown command id: {0}")]
    UnknownCommand(u8),

    /// A record or buffer is shorter than its layout requires
    #[error("Truncated record: expected {expected} bytes, found {found}")]
    TruncatedRecord {
        /// Bytes required
        expected: usize,
        /// Bytes available
        found: usize,
    },

    /// A record index past the end of a buffer
    #[error("Record index {index} out of range for buffer of {len}")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Records in the buffer
        len: usize,
    },

    /// A stateful command submitted as an item's draw
    #[error("{} is not a draw command", .kind.name())]
    NotADrawCommand {
        /// Kind that was submitted
        kind: CommandKind,
    },

    /// An item carries more state layers than the queue accepts
    #[error("State stack depth exceeded: {depth} > {max}")]
    StateStackOverflow {
        /// Layers submitted
        depth: usize,
        /// Configured limit
        max: usize,
    },

    /// A buffer capacity whose byte size does not fit in `usize`
    #[error("Command buffer capacity overflow: {slots} slots")]
    CapacityOverflow {
        /// Requested capacity in records
        slots: usize,
    },
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
