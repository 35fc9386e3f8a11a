//! Command encoding
//!
//! A closed set of fixed-layout command records. Every kind has:
//!
//! - a small id (its [`CommandKind`] discriminant)
//! - a `#[repr(C)]` payload struct whose size is known at compile time
//! - a dispatch entry: one [`RenderBackend`] method
//!
//! [`COMMAND_TABLE`] is the immutable registry indexed by id. Ids below
//! [`DIRECT_COMMAND_THRESHOLD`] are *direct*: draws and framebuffer clears
//! that act on the GPU each time they run and are never deduplicated. Ids at
//! or above the threshold set state and may be skipped when the same value
//! is already active.
//!
//! ## Slot layout
//!
//! Command buffers store records in fixed [`SLOT_SIZE`] slots:
//!
//! ```text
//! byte 0      id
//! bytes 1..4  zero
//! bytes 4..   payload (COMMAND_TABLE[id].size bytes), zero-filled to SLOT_SIZE
//! ```

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use nalgebra::{Matrix4, Vector4};

use std::fmt::Debug;

use crate::foundation::memory::CommandAllocator;
use super::api::RenderBackend;
use super::command_buffer::CommandBuffer;
use super::{RenderError, RenderResult};

/// Number of command kinds
pub const COMMAND_KIND_COUNT: usize = 15;

/// Ids below this value are direct (never deduplicated)
pub const DIRECT_COMMAND_THRESHOLD: u8 = 3;

/// Bytes in front of the payload inside a slot
pub const SLOT_HEADER_SIZE: usize = 4;

/// Largest payload of any command kind
pub const MAX_PAYLOAD_SIZE: usize = max_payload_size();

/// Fixed size of one command slot
pub const SLOT_SIZE: usize = SLOT_HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// Registry entry describing one command kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandInfo {
    /// The kind described
    pub kind: CommandKind,
    /// Human-readable name
    pub name: &'static str,
    /// Payload size in bytes
    pub size: usize,
    /// Whether the kind bypasses deduplication
    pub direct: bool,
}

/// A payload type that can be recorded into a command buffer
pub trait CommandPayload: Pod {
    /// Kind this payload encodes
    const KIND: CommandKind;

    /// Wrap the payload into the command sum type
    fn into_command(self) -> Command;

    /// Append the payload as a new record of `buffer`
    ///
    /// Returns the index of the record.
    fn record_into<B, A>(self, buffer: &mut CommandBuffer<B>, allocator: &mut A) -> RenderResult<usize>
    where
        B: Copy + Eq + Debug,
        A: CommandAllocator<Block = B>,
    {
        buffer.push(allocator, self)
    }
}

macro_rules! define_commands {
    ($(
        $(#[$meta:meta])*
        $id:literal => $name:ident / $method:ident {
            $( $(#[$field_meta:meta])* $field:ident : $ty:ty ),* $(,)?
        }
    )*) => {
        $(
            $(#[$meta])*
            #[repr(C)]
            #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
            pub struct $name {
                $( $(#[$field_meta])* pub $field: $ty, )*
            }

            impl CommandPayload for $name {
                const KIND: CommandKind = CommandKind::$name;

                fn into_command(self) -> Command {
                    Command::$name(self)
                }
            }

            impl From<$name> for Command {
                fn from(payload: $name) -> Self {
                    Command::$name(payload)
                }
            }
        )*

        /// Discriminant of a command kind; the value is the command id
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum CommandKind {
            $(
                #[doc = concat!("[`", stringify!($name), "`]")]
                $name = $id,
            )*
        }

        impl CommandKind {
            /// Every kind, in id order
            pub const ALL: [CommandKind; COMMAND_KIND_COUNT] = [$(CommandKind::$name),*];

            /// Look up a kind by id
            pub const fn from_id(id: u8) -> Option<Self> {
                match id {
                    $( $id => Some(CommandKind::$name), )*
                    _ => None,
                }
            }
        }

        /// One command record, as a closed sum over every payload type
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub enum Command {
            $(
                #[doc = concat!("[`", stringify!($name), "`]")]
                $name($name),
            )*
        }

        impl Command {
            /// Kind of this command
            pub const fn kind(&self) -> CommandKind {
                match self {
                    $( Command::$name(_) => CommandKind::$name, )*
                }
            }

            /// Forward the command to the matching backend call
            pub fn apply<R: RenderBackend + ?Sized>(&self, backend: &mut R) {
                match self {
                    $( Command::$name(payload) => backend.$method(payload), )*
                }
            }

            fn payload_bytes(&self) -> &[u8] {
                match self {
                    $( Command::$name(payload) => bytemuck::bytes_of(payload), )*
                }
            }

            fn from_payload_bytes(kind: CommandKind, bytes: &[u8]) -> Self {
                match kind {
                    $( CommandKind::$name => Command::$name(bytemuck::pod_read_unaligned(bytes)), )*
                }
            }
        }

        /// Immutable registry of command kinds, indexed by id
        pub const COMMAND_TABLE: [CommandInfo; COMMAND_KIND_COUNT] = [
            $(
                CommandInfo {
                    kind: CommandKind::$name,
                    name: stringify!($name),
                    size: std::mem::size_of::<$name>(),
                    direct: $id < DIRECT_COMMAND_THRESHOLD,
                },
            )*
        ];
    };
}

define_commands! {
    /// Draw non-indexed triangles from the bound vertex array
    0 => DrawArrays / draw_arrays {
        /// First vertex
        first: u32,
        /// Number of vertices
        count: u32,
    }

    /// Draw indexed triangles from the bound vertex array
    1 => DrawIndexed / draw_indexed {
        /// Number of indices
        index_count: u32,
        /// Offset of the first index
        first_index: u32,
        /// Value added to each index
        base_vertex: i32,
    }

    /// Clear the selected framebuffer attachments
    2 => ClearTargets / clear_targets {
        /// [`ClearMask`] bits
        mask: u32,
    }

    /// Set the color used by color clears
    3 => ClearColor / clear_color {
        /// Red
        r: f32,
        /// Green
        g: f32,
        /// Blue
        b: f32,
        /// Alpha
        a: f32,
    }

    /// Set the viewport rectangle
    4 => SetViewport / set_viewport {
        /// Left edge
        x: i32,
        /// Bottom edge
        y: i32,
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    }

    /// Bind a vertex array object
    5 => BindVertexArray / bind_vertex_array {
        /// Backend handle
        handle: u32,
    }

    /// Bind a shader program
    6 => BindProgram / bind_program {
        /// Backend handle
        handle: u32,
    }

    /// Bind a texture to a texture unit
    7 => BindTexture / bind_texture {
        /// Backend handle
        handle: u32,
        /// Texture unit
        unit: u32,
    }

    /// Bind a sampler to a texture unit
    8 => BindSampler / bind_sampler {
        /// Backend handle
        handle: u32,
        /// Texture unit
        unit: u32,
    }

    /// Bind a uniform buffer to a binding point
    9 => BindUniformBuffer / bind_uniform_buffer {
        /// Backend handle
        handle: u32,
        /// Binding point
        binding: u32,
    }

    /// Set a float uniform on the bound program
    10 => SetUniformFloat / set_uniform_float {
        /// Uniform location
        location: i32,
        /// Value
        value: f32,
    }

    /// Set a vec4 uniform on the bound program
    11 => SetUniformVec4 / set_uniform_vec4 {
        /// Uniform location
        location: i32,
        /// Value
        value: [f32; 4],
    }

    /// Set a mat4 uniform on the bound program (column-major)
    12 => SetUniformMat4 / set_uniform_mat4 {
        /// Uniform location
        location: i32,
        /// Column-major matrix
        value: [f32; 16],
    }

    /// Select the blend equation
    13 => SetBlendMode / set_blend_mode {
        /// [`BlendMode`] discriminant
        mode: u32,
    }

    /// Configure depth testing and depth writes
    14 => SetDepthState / set_depth_state {
        /// Non-zero enables the depth test
        test: u32,
        /// Non-zero enables depth writes
        write: u32,
    }
}

const _: () = {
    let mut id = 0;
    while id < COMMAND_KIND_COUNT {
        assert!(COMMAND_TABLE[id].kind as usize == id, "command ids must be dense and ordered");
        id += 1;
    }
};

const fn max_payload_size() -> usize {
    let mut max = 0;
    let mut id = 0;
    while id < COMMAND_KIND_COUNT {
        if COMMAND_TABLE[id].size > max {
            max = COMMAND_TABLE[id].size;
        }
        id += 1;
    }
    max
}

bitflags! {
    /// Attachments cleared by [`ClearTargets`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearMask: u32 {
        /// Color attachment
        const COLOR = 1 << 0;
        /// Depth attachment
        const DEPTH = 1 << 1;
        /// Stencil attachment
        const STENCIL = 1 << 2;
    }
}

/// Blend equations selectable through [`SetBlendMode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum BlendMode {
    /// Blending disabled
    Opaque = 0,
    /// `src * a + dst * (1 - a)`
    Alpha = 1,
    /// `src + dst`
    Additive = 2,
    /// `src * dst`
    Multiply = 3,
}

impl BlendMode {
    /// Decode a stored discriminant
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Opaque),
            1 => Some(Self::Alpha),
            2 => Some(Self::Additive),
            3 => Some(Self::Multiply),
            _ => None,
        }
    }
}

/// Target of a state command, used to detect overrides inside one item
///
/// Two commands with the same slot write the same piece of GPU state; the
/// later one fully replaces the earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateSlot {
    /// Kind of the state command
    pub kind: CommandKind,
    /// Unit or binding point for per-unit kinds, zero otherwise
    pub target: u32,
}

impl CommandKind {
    /// Command id
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Registry entry
    pub const fn info(self) -> CommandInfo {
        COMMAND_TABLE[self as usize]
    }

    /// Payload size in bytes
    pub const fn size(self) -> usize {
        self.info().size
    }

    /// Whether this kind bypasses deduplication
    pub const fn is_direct(self) -> bool {
        self.id() < DIRECT_COMMAND_THRESHOLD
    }

    /// Human-readable name
    pub const fn name(self) -> &'static str {
        self.info().name
    }

    /// Kind whose current value decides what this kind writes to
    pub const fn observes(self) -> Option<CommandKind> {
        match self {
            Self::SetUniformFloat | Self::SetUniformVec4 | Self::SetUniformMat4 => {
                Some(Self::BindProgram)
            }
            _ => None,
        }
    }
}

impl Command {
    /// Command id
    pub const fn id(&self) -> u8 {
        self.kind().id()
    }

    /// Payload size in bytes
    pub const fn size(&self) -> usize {
        self.kind().size()
    }

    /// Whether this command bypasses deduplication
    pub const fn is_direct(&self) -> bool {
        self.kind().is_direct()
    }

    /// The piece of GPU state this command overwrites
    ///
    /// `None` for direct commands and for uniform values, whose target
    /// depends on whichever program is bound when they run.
    pub const fn state_slot(&self) -> Option<StateSlot> {
        let target = match self {
            Command::DrawArrays(_)
            | Command::DrawIndexed(_)
            | Command::ClearTargets(_)
            | Command::SetUniformFloat(_)
            | Command::SetUniformVec4(_)
            | Command::SetUniformMat4(_) => return None,
            Command::BindTexture(cmd) => cmd.unit,
            Command::BindSampler(cmd) => cmd.unit,
            Command::BindUniformBuffer(cmd) => cmd.binding,
            Command::ClearColor(_)
            | Command::SetViewport(_)
            | Command::BindVertexArray(_)
            | Command::BindProgram(_)
            | Command::SetBlendMode(_)
            | Command::SetDepthState(_) => 0,
        };
        Some(StateSlot {
            kind: self.kind(),
            target,
        })
    }

    /// State this command reads when it runs
    ///
    /// Uniform values are written into the currently bound program, so
    /// their effect depends on the [`BindProgram`] in force.
    pub const fn observed_slot(&self) -> Option<StateSlot> {
        match self.kind().observes() {
            Some(kind) => Some(StateSlot { kind, target: 0 }),
            None => None,
        }
    }

    /// Write the command into a slot
    ///
    /// Bytes past the payload are zeroed so that slots holding equal
    /// commands are byte-identical.
    pub fn encode_into(&self, slot: &mut [u8]) -> Result<(), RenderError> {
        if slot.len() < SLOT_SIZE {
            return Err(RenderError::TruncatedRecord {
                expected: SLOT_SIZE,
                found: slot.len(),
            });
        }

        let payload = self.payload_bytes();
        let slot = &mut slot[..SLOT_SIZE];
        slot.fill(0);
        slot[0] = self.id();
        slot[SLOT_HEADER_SIZE..SLOT_HEADER_SIZE + payload.len()].copy_from_slice(payload);
        Ok(())
    }

    /// Read a command back from a slot
    ///
    /// An id outside the registry means the stream is corrupt; it is
    /// reported, never skipped.
    pub fn decode(slot: &[u8]) -> Result<Self, RenderError> {
        let id = *slot.first().ok_or(RenderError::TruncatedRecord {
            expected: SLOT_HEADER_SIZE,
            found: 0,
        })?;
        let kind = CommandKind::from_id(id).ok_or(RenderError::UnknownCommand(id))?;

        let end = SLOT_HEADER_SIZE + kind.size();
        let payload = slot.get(SLOT_HEADER_SIZE..end).ok_or(RenderError::TruncatedRecord {
            expected: end,
            found: slot.len(),
        })?;
        Ok(Self::from_payload_bytes(kind, payload))
    }
}

impl DrawArrays {
    /// Draw `count` vertices starting at `first`
    pub const fn new(first: u32, count: u32) -> Self {
        Self { first, count }
    }
}

impl DrawIndexed {
    /// Draw `index_count` indices starting at `first_index`
    pub const fn new(index_count: u32, first_index: u32, base_vertex: i32) -> Self {
        Self {
            index_count,
            first_index,
            base_vertex,
        }
    }
}

impl ClearTargets {
    /// Clear the attachments in `mask`
    pub const fn new(mask: ClearMask) -> Self {
        Self { mask: mask.bits() }
    }

    /// Attachments to clear; unknown bits are dropped
    pub const fn mask(&self) -> ClearMask {
        ClearMask::from_bits_truncate(self.mask)
    }
}

impl ClearColor {
    /// Clear color from RGBA components
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl SetViewport {
    /// Viewport rectangle
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

impl BindVertexArray {
    /// Bind vertex array `handle`
    pub const fn new(handle: u32) -> Self {
        Self { handle }
    }
}

impl BindProgram {
    /// Bind program `handle`
    pub const fn new(handle: u32) -> Self {
        Self { handle }
    }
}

impl BindTexture {
    /// Bind texture `handle` to `unit`
    pub const fn new(handle: u32, unit: u32) -> Self {
        Self { handle, unit }
    }
}

impl BindSampler {
    /// Bind sampler `handle` to `unit`
    pub const fn new(handle: u32, unit: u32) -> Self {
        Self { handle, unit }
    }
}

impl BindUniformBuffer {
    /// Bind uniform buffer `handle` to `binding`
    pub const fn new(handle: u32, binding: u32) -> Self {
        Self { handle, binding }
    }
}

impl SetUniformFloat {
    /// Float uniform at `location`
    pub const fn new(location: i32, value: f32) -> Self {
        Self { location, value }
    }
}

impl SetUniformVec4 {
    /// Vec4 uniform at `location`
    pub const fn new(location: i32, value: [f32; 4]) -> Self {
        Self { location, value }
    }

    /// Vec4 uniform from a vector
    pub fn from_vector(location: i32, value: &Vector4<f32>) -> Self {
        Self::new(location, [value.x, value.y, value.z, value.w])
    }
}

impl SetUniformMat4 {
    /// Mat4 uniform from column-major floats
    pub const fn new(location: i32, value: [f32; 16]) -> Self {
        Self { location, value }
    }

    /// Mat4 uniform from a matrix
    pub fn from_matrix(location: i32, matrix: &Matrix4<f32>) -> Self {
        let mut value = [0.0; 16];
        value.copy_from_slice(matrix.as_slice());
        Self::new(location, value)
    }
}

impl SetBlendMode {
    /// Select `mode`
    pub const fn new(mode: BlendMode) -> Self {
        Self { mode: mode as u32 }
    }

    /// Selected blend mode, `None` if the stored value is unknown
    pub const fn mode(&self) -> Option<BlendMode> {
        BlendMode::from_raw(self.mode)
    }
}

impl SetDepthState {
    /// Depth test and depth write switches
    pub const fn new(test: bool, write: bool) -> Self {
        Self {
            test: test as u32,
            write: write as u32,
        }
    }

    /// Whether the depth test is enabled
    pub const fn test_enabled(&self) -> bool {
        self.test != 0
    }

    /// Whether depth writes are enabled
    pub const fn write_enabled(&self) -> bool {
        self.write != 0
    }
}
