//! Recorded device operations.
//!
//! Every mutating proxy call is expressed as a [`DeviceCommand`]. On the
//! owning thread the command executes immediately; on any other thread it is
//! appended to that thread's [`CommandBuffer`] and replayed later.

use crate::backend::RawDevice;
use crate::error::{DeviceError, DeviceResult};
use crate::state_cache::{StateSlot, StateValue};
use crate::types::{
    BufferHandle, ClearFlags, IndexedDraw, PrimitiveType, Rect, RenderStateType, ShaderHandle,
    StreamBinding, SurfaceHandle, TextureHandle, VertexDeclHandle, Viewport,
};

/// Operation identifier of a [`DeviceCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum OpCode {
    SetRenderState,
    SetTextureStageState,
    SetSamplerState,
    SetTexture,
    SetVertexShader,
    SetPixelShader,
    SetVertexDeclaration,
    SetIndices,
    SetStreamSource,
    SetVertexShaderConstants,
    SetPixelShaderConstants,
    SetViewport,
    SetScissorRect,
    SetRenderTarget,
    SetDepthStencilSurface,
    Clear,
    BeginScene,
    EndScene,
    DrawPrimitive,
    DrawIndexedPrimitive,
    PushRenderState,
    PopRenderState,
    Present,
}

/// A device operation together with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    SetRenderState {
        state: RenderStateType,
        value: u32,
    },
    SetTextureStageState {
        stage: u32,
        state: u32,
        value: u32,
    },
    SetSamplerState {
        sampler: u32,
        state: u32,
        value: u32,
    },
    SetTexture {
        stage: u32,
        texture: Option<TextureHandle>,
    },
    SetVertexShader(Option<ShaderHandle>),
    SetPixelShader(Option<ShaderHandle>),
    SetVertexDeclaration(Option<VertexDeclHandle>),
    SetIndices(Option<BufferHandle>),
    SetStreamSource {
        stream: u32,
        binding: StreamBinding,
    },
    SetVertexShaderConstants {
        start_register: u32,
        data: Vec<[f32; 4]>,
    },
    SetPixelShaderConstants {
        start_register: u32,
        data: Vec<[f32; 4]>,
    },
    SetViewport(Viewport),
    SetScissorRect(Rect),
    SetRenderTarget {
        index: u32,
        surface: Option<SurfaceHandle>,
    },
    SetDepthStencilSurface(Option<SurfaceHandle>),
    Clear {
        flags: ClearFlags,
        color: u32,
        z: f32,
        stencil: u32,
    },
    BeginScene,
    EndScene,
    DrawPrimitive {
        primitive: PrimitiveType,
        start_vertex: u32,
        primitive_count: u32,
    },
    DrawIndexedPrimitive(IndexedDraw),
    /// Save the current value of a render state.
    PushRenderState(RenderStateType),
    /// Restore the most recently pushed render state.
    PopRenderState,
    Present,
}

impl DeviceCommand {
    pub fn op(&self) -> OpCode {
        match self {
            Self::SetRenderState { .. } => OpCode::SetRenderState,
            Self::SetTextureStageState { .. } => OpCode::SetTextureStageState,
            Self::SetSamplerState { .. } => OpCode::SetSamplerState,
            Self::SetTexture { .. } => OpCode::SetTexture,
            Self::SetVertexShader(_) => OpCode::SetVertexShader,
            Self::SetPixelShader(_) => OpCode::SetPixelShader,
            Self::SetVertexDeclaration(_) => OpCode::SetVertexDeclaration,
            Self::SetIndices(_) => OpCode::SetIndices,
            Self::SetStreamSource { .. } => OpCode::SetStreamSource,
            Self::SetVertexShaderConstants { .. } => OpCode::SetVertexShaderConstants,
            Self::SetPixelShaderConstants { .. } => OpCode::SetPixelShaderConstants,
            Self::SetViewport(_) => OpCode::SetViewport,
            Self::SetScissorRect(_) => OpCode::SetScissorRect,
            Self::SetRenderTarget { .. } => OpCode::SetRenderTarget,
            Self::SetDepthStencilSurface(_) => OpCode::SetDepthStencilSurface,
            Self::Clear { .. } => OpCode::Clear,
            Self::BeginScene => OpCode::BeginScene,
            Self::EndScene => OpCode::EndScene,
            Self::DrawPrimitive { .. } => OpCode::DrawPrimitive,
            Self::DrawIndexedPrimitive(_) => OpCode::DrawIndexedPrimitive,
            Self::PushRenderState(_) => OpCode::PushRenderState,
            Self::PopRenderState => OpCode::PopRenderState,
            Self::Present => OpCode::Present,
        }
    }

    /// The cache slot and value this command writes, for cacheable commands.
    pub fn cached_state(&self) -> Option<(StateSlot, StateValue)> {
        let entry = match *self {
            Self::SetRenderState { state, value } => {
                (StateSlot::RenderState(state), StateValue::Dword(value))
            }
            Self::SetTextureStageState {
                stage,
                state,
                value,
            } => (
                StateSlot::TextureStageState { stage, state },
                StateValue::Dword(value),
            ),
            Self::SetSamplerState {
                sampler,
                state,
                value,
            } => (
                StateSlot::SamplerState { sampler, state },
                StateValue::Dword(value),
            ),
            Self::SetTexture { stage, texture } => {
                (StateSlot::Texture(stage), StateValue::Texture(texture))
            }
            Self::SetVertexShader(shader) => (StateSlot::VertexShader, StateValue::Shader(shader)),
            Self::SetPixelShader(shader) => (StateSlot::PixelShader, StateValue::Shader(shader)),
            Self::SetVertexDeclaration(decl) => (
                StateSlot::VertexDeclaration,
                StateValue::Declaration(decl),
            ),
            Self::SetIndices(buffer) => (StateSlot::Indices, StateValue::Buffer(buffer)),
            Self::SetStreamSource { stream, binding } => {
                (StateSlot::StreamSource(stream), StateValue::Stream(binding))
            }
            _ => return None,
        };
        Some(entry)
    }

    /// Issue this command against the device.
    ///
    /// Render-state stack commands need the state cache and are handled by
    /// the proxy; calling this with one of them is an invalid call.
    pub fn apply(&self, device: &mut dyn RawDevice) -> DeviceResult<()> {
        match self {
            Self::SetRenderState { state, value } => device.set_render_state(*state, *value),
            Self::SetTextureStageState {
                stage,
                state,
                value,
            } => device.set_texture_stage_state(*stage, *state, *value),
            Self::SetSamplerState {
                sampler,
                state,
                value,
            } => device.set_sampler_state(*sampler, *state, *value),
            Self::SetTexture { stage, texture } => device.set_texture(*stage, *texture),
            Self::SetVertexShader(shader) => device.set_vertex_shader(*shader),
            Self::SetPixelShader(shader) => device.set_pixel_shader(*shader),
            Self::SetVertexDeclaration(decl) => device.set_vertex_declaration(*decl),
            Self::SetIndices(buffer) => device.set_indices(*buffer),
            Self::SetStreamSource { stream, binding } => {
                device.set_stream_source(*stream, *binding)
            }
            Self::SetVertexShaderConstants {
                start_register,
                data,
            } => device.set_vertex_shader_constants(*start_register, data),
            Self::SetPixelShaderConstants {
                start_register,
                data,
            } => device.set_pixel_shader_constants(*start_register, data),
            Self::SetViewport(viewport) => device.set_viewport(viewport),
            Self::SetScissorRect(rect) => device.set_scissor_rect(rect),
            Self::SetRenderTarget { index, surface } => device.set_render_target(*index, *surface),
            Self::SetDepthStencilSurface(surface) => device.set_depth_stencil_surface(*surface),
            Self::Clear {
                flags,
                color,
                z,
                stencil,
            } => device.clear(*flags, *color, *z, *stencil),
            Self::BeginScene => device.begin_scene(),
            Self::EndScene => device.end_scene(),
            Self::DrawPrimitive {
                primitive,
                start_vertex,
                primitive_count,
            } => device.draw_primitive(*primitive, *start_vertex, *primitive_count),
            Self::DrawIndexedPrimitive(draw) => device.draw_indexed_primitive(draw),
            Self::Present => device.present(),
            Self::PushRenderState(_) | Self::PopRenderState => Err(DeviceError::InvalidCall(
                format!("{:?} cannot be issued to the device directly", self.op()),
            )),
        }
    }

    /// Primitive count for draw commands, zero otherwise.
    pub fn primitive_count(&self) -> u32 {
        match self {
            Self::DrawPrimitive {
                primitive_count, ..
            } => *primitive_count,
            Self::DrawIndexedPrimitive(draw) => draw.primitive_count,
            _ => 0,
        }
    }
}

/// A recorded command stamped with the frame it was recorded in.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandEntry {
    pub command: DeviceCommand,
    pub recorded_frame: u32,
}

/// Append-only, bounded sequence of recorded commands.
///
/// Written only by the thread that owns it, drained only by the replay engine.
#[derive(Debug)]
pub struct CommandBuffer {
    entries: Vec<CommandEntry>,
    capacity: usize,
}

impl CommandBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    /// Append a command.
    ///
    /// Fails without blocking when the buffer is full.
    pub fn push(&mut self, command: DeviceCommand, recorded_frame: u32) -> DeviceResult<()> {
        if self.entries.len() >= self.capacity {
            return Err(DeviceError::CommandBufferFull {
                capacity: self.capacity,
            });
        }
        self.entries.push(CommandEntry {
            command,
            recorded_frame,
        });
        Ok(())
    }

    /// Take every entry, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<CommandEntry> {
        std::mem::take(&mut self.entries)
    }

    /// Hand back a drained vector so its allocation is reused.
    pub fn recycle(&mut self, mut spent: Vec<CommandEntry>) {
        if self.entries.is_empty() && spent.capacity() > self.entries.capacity() {
            spent.clear();
            self.entries = spent;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
