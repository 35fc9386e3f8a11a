//! Public rendering API
//!
//! This module contains the execution backend seam: the trait a graphics
//! device implements to receive commands, plus a logging implementation.

pub mod render_backend;

// Re-export commonly used types
pub use render_backend::{RenderBackend, LogBackend};
