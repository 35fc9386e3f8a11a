//! # Core Engine Module
//!
//! Shared configuration for the engine subsystems.
//!
//! ## Organization
//!
//! - **Config**: Configuration structures for the render queue and engine
//! - **Foundation**: Low-level utilities (memory, logging)

pub mod config;

// Re-export foundation modules for convenience
pub use crate::foundation;

// Re-export commonly used config types
pub use config::{
    EngineConfig,
    RenderQueueConfig,
    SortPolicy,
    Config,
    ConfigError,
};
