//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Memory management (arena and free-list allocators)
//! - Logging utilities

pub mod memory;
pub mod logging;
