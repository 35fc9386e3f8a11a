//! # Demo Engine
//!
//! Command buffer and render queue layer of a small real-time renderer.
//!
//! ## Features
//!
//! - **Pluggable Allocators**: bump arena and growable free-list heap behind
//!   one allocator trait
//! - **Command Buffers**: fixed-slot encoded command records, built once and
//!   replayed as often as needed
//! - **Render Queue**: per-frame sort and redundant-state elimination before
//!   commands reach the device
//! - **Config Files**: TOML or RON engine settings
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use demo_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default();
//!     demo_engine::foundation::logging::init_from_config(&config);
//!
//!     let mut heap = HeapAllocator::new();
//!     let mut material = CommandBuffer::create(&mut heap, 4)?;
//!     material.bind_program(&mut heap, 7)?;
//!     material.bind_texture(&mut heap, 3, 0)?;
//!
//!     let mut queue = RenderQueue::with_config(config.queue.clone())?;
//!     queue.submit(SortKey::new(0, 0, 7), DrawIndexed::new(36, 0, 0), &[material.view()])?;
//!
//!     let mut device = LogBackend::new();
//!     let stats = queue.send_to_backend(&heap, &mut device)?;
//!     assert_eq!(stats.draws, 1);
//!
//!     material.destroy(&mut heap)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Core engine modules
pub mod core;
pub mod config;

pub mod foundation;
pub mod render;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        core::config::{EngineConfig, RenderQueueConfig, SortPolicy, Config, ConfigError},
        foundation::memory::{
            AllocError, Arena, ArenaBlock, CommandAllocator, HeapAllocator, HeapBlock,
        },
        render::{
            BufferView, Command, CommandBuffer, CommandKind, FlushStats, LogBackend,
            RenderBackend, RenderError, RenderQueue, RenderResult, SortKey,
            commands::{
                BindProgram, BindSampler, BindTexture, BindUniformBuffer, BindVertexArray,
                BlendMode, ClearColor, ClearMask, ClearTargets, DrawArrays, DrawIndexed,
                SetBlendMode, SetDepthState, SetUniformFloat, SetUniformMat4, SetUniformVec4,
                SetViewport,
            },
        },
    };
}
