//! Backend abstraction traits for the rendering system
//!
//! A backend receives the commands that survive deduplication, one call per
//! command. The trait has one required method per command kind, so an
//! implementation covers every id by construction; [`Command::apply`] is
//! the dispatch table.

use crate::render::commands::{
    BindProgram, BindSampler, BindTexture, BindUniformBuffer, BindVertexArray, ClearColor,
    ClearTargets, Command, CommandKind, DrawArrays, DrawIndexed, SetBlendMode, SetDepthState,
    SetUniformFloat, SetUniformMat4, SetUniformVec4, SetViewport, COMMAND_KIND_COUNT,
};

/// Execution backend for command streams
///
/// Implemented by the graphics device wrapper. Each method maps one
/// command kind to the underlying graphics API call.
pub trait RenderBackend {
    /// Draw non-indexed triangles
    fn draw_arrays(&mut self, cmd: &DrawArrays);

    /// Draw indexed triangles
    fn draw_indexed(&mut self, cmd: &DrawIndexed);

    /// Clear framebuffer attachments
    fn clear_targets(&mut self, cmd: &ClearTargets);

    /// Set the clear color
    fn clear_color(&mut self, cmd: &ClearColor);

    /// Set the viewport
    fn set_viewport(&mut self, cmd: &SetViewport);

    /// Bind a vertex array
    fn bind_vertex_array(&mut self, cmd: &BindVertexArray);

    /// Bind a shader program
    fn bind_program(&mut self, cmd: &BindProgram);

    /// Bind a texture to a unit
    fn bind_texture(&mut self, cmd: &BindTexture);

    /// Bind a sampler to a unit
    fn bind_sampler(&mut self, cmd: &BindSampler);

    /// Bind a uniform buffer to a binding point
    fn bind_uniform_buffer(&mut self, cmd: &BindUniformBuffer);

    /// Set a float uniform
    fn set_uniform_float(&mut self, cmd: &SetUniformFloat);

    /// Set a vec4 uniform
    fn set_uniform_vec4(&mut self, cmd: &SetUniformVec4);

    /// Set a mat4 uniform
    fn set_uniform_mat4(&mut self, cmd: &SetUniformMat4);

    /// Set the blend mode
    fn set_blend_mode(&mut self, cmd: &SetBlendMode);

    /// Set depth test / write state
    fn set_depth_state(&mut self, cmd: &SetDepthState);
}

/// Backend that logs every call and counts calls per kind
///
/// Useful as a stand-in device when running without a graphics context,
/// and for checking how many calls a frame really issues.
#[derive(Debug, Default, Clone)]
pub struct LogBackend {
    calls: [usize; COMMAND_KIND_COUNT],
}

impl LogBackend {
    /// Create a backend with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls received for one kind
    pub fn calls(&self, kind: CommandKind) -> usize {
        self.calls[kind as usize]
    }

    /// Calls received across all kinds
    pub fn total_calls(&self) -> usize {
        self.calls.iter().sum()
    }

    /// Zero every counter
    pub fn reset(&mut self) {
        self.calls = [0; COMMAND_KIND_COUNT];
    }

    fn record(&mut self, command: Command) {
        log::trace!("{}: {:?}", command.kind().name(), command);
        self.calls[command.kind() as usize] += 1;
    }
}

impl RenderBackend for LogBackend {
    fn draw_arrays(&mut self, cmd: &DrawArrays) {
        self.record(Command::DrawArrays(*cmd));
    }

    fn draw_indexed(&mut self, cmd: &DrawIndexed) {
        self.record(Command::DrawIndexed(*cmd));
    }

    fn clear_targets(&mut self, cmd: &ClearTargets) {
        self.record(Command::ClearTargets(*cmd));
    }

    fn clear_color(&mut self, cmd: &ClearColor) {
        self.record(Command::ClearColor(*cmd));
    }

    fn set_viewport(&mut self, cmd: &SetViewport) {
        self.record(Command::SetViewport(*cmd));
    }

    fn bind_vertex_array(&mut self, cmd: &BindVertexArray) {
        self.record(Command::BindVertexArray(*cmd));
    }

    fn bind_program(&mut self, cmd: &BindProgram) {
        self.record(Command::BindProgram(*cmd));
    }

    fn bind_texture(&mut self, cmd: &BindTexture) {
        self.record(Command::BindTexture(*cmd));
    }

    fn bind_sampler(&mut self, cmd: &BindSampler) {
        self.record(Command::BindSampler(*cmd));
    }

    fn bind_uniform_buffer(&mut self, cmd: &BindUniformBuffer) {
        self.record(Command::BindUniformBuffer(*cmd));
    }

    fn set_uniform_float(&mut self, cmd: &SetUniformFloat) {
        self.record(Command::SetUniformFloat(*cmd));
    }

    fn set_uniform_vec4(&mut self, cmd: &SetUniformVec4) {
        self.record(Command::SetUniformVec4(*cmd));
    }

    fn set_uniform_mat4(&mut self, cmd: &SetUniformMat4) {
        self.record(Command::SetUniformMat4(*cmd));
    }

    fn set_blend_mode(&mut self, cmd: &SetBlendMode) {
        self.record(Command::SetBlendMode(*cmd));
    }

    fn set_depth_state(&mut self, cmd: &SetDepthState) {
        self.record(Command::SetDepthState(*cmd));
    }
}
