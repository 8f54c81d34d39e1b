//! Dummy device backend for testing and development.
//!
//! The dummy backend performs no rendering. Every call is logged and recorded
//! in a shared [`DummyProbe`], which tests also use to script device loss,
//! reset failures and creation failures.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{DeviceCreateInfo, DeviceDriver, RawDevice};
use crate::command::{DeviceCommand, OpCode};
use crate::error::{DeviceError, DeviceResult};
use crate::fence::Fence;
use crate::types::{
    AdapterInfo, AdapterType, BufferHandle, ClearFlags, CooperativeLevel, DepthFormat,
    DeviceCapabilities, DisplayMode, Extent2d, Format, IndexedDraw, PresentationParameters,
    PrimitiveType, Rect, RenderStateType, ShaderHandle, StreamBinding, SurfaceHandle,
    TextureHandle, VertexDeclHandle, Viewport,
};

#[derive(Debug)]
struct ProbeState {
    adapters: Vec<AdapterInfo>,
    fail_enumeration: bool,
    unsupported_depth: Vec<DepthFormat>,
    create_failures: u32,
    create_attempts: u32,
    devices_created: u32,
    cooperative_script: VecDeque<CooperativeLevel>,
    cooperative_polls: u32,
    reset_script: VecDeque<DeviceResult<()>>,
    reset_calls: u32,
    last_presentation: Option<PresentationParameters>,
    commands: Vec<DeviceCommand>,
    command_delay: Duration,
    fail_next: Option<(OpCode, DeviceError)>,
    available_memory: u64,
    hold_fences: bool,
    pending_fences: Vec<Fence>,
    fences_issued: u32,
    live_scratch_surfaces: u32,
    next_surface: u64,
}

impl Default for ProbeState {
    fn default() -> Self {
        Self {
            adapters: DummyDriver::default_adapters(),
            fail_enumeration: false,
            unsupported_depth: Vec::new(),
            create_failures: 0,
            create_attempts: 0,
            devices_created: 0,
            cooperative_script: VecDeque::new(),
            cooperative_polls: 0,
            reset_script: VecDeque::new(),
            reset_calls: 0,
            last_presentation: None,
            commands: Vec::new(),
            command_delay: Duration::ZERO,
            fail_next: None,
            available_memory: 256 * 1024 * 1024,
            hold_fences: false,
            pending_fences: Vec::new(),
            fences_issued: 0,
            live_scratch_surfaces: 0,
            next_surface: 1,
        }
    }
}

/// Shared view into a dummy driver and every device it created.
///
/// Cloning the probe is cheap; all clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct DummyProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl DummyProbe {
    pub fn new() -> Self {
        Self::default()
    }

    // --- scripting ---

    /// Replace the raw adapter list reported by enumeration.
    pub fn set_adapters(&self, adapters: Vec<AdapterInfo>) {
        self.state.lock().adapters = adapters;
    }

    /// Make adapter enumeration fail.
    pub fn set_fail_enumeration(&self, fail: bool) {
        self.state.lock().fail_enumeration = fail;
    }

    /// Mark a depth format as unsupported on every adapter.
    pub fn set_depth_format_unsupported(&self, format: DepthFormat) {
        self.state.lock().unsupported_depth.push(format);
    }

    /// Make the next `count` device creations fail.
    pub fn fail_next_creations(&self, count: u32) {
        self.state.lock().create_failures = count;
    }

    /// Queue cooperative levels returned by successive health checks.
    /// Once the script runs out the device reports `Ok`.
    pub fn script_cooperative_levels(&self, levels: impl IntoIterator<Item = CooperativeLevel>) {
        self.state.lock().cooperative_script.extend(levels);
    }

    /// Queue results returned by successive reset calls.
    /// Once the script runs out resets succeed.
    pub fn script_reset_results(&self, results: impl IntoIterator<Item = DeviceResult<()>>) {
        self.state.lock().reset_script.extend(results);
    }

    /// Make the next command with the given opcode fail with `error`.
    pub fn fail_next_command(&self, op: OpCode, error: DeviceError) {
        self.state.lock().fail_next = Some((op, error));
    }

    /// Sleep this long inside every recorded device call.
    pub fn set_command_delay(&self, delay: Duration) {
        self.state.lock().command_delay = delay;
    }

    pub fn set_available_memory(&self, bytes: u64) {
        self.state.lock().available_memory = bytes;
    }

    /// Keep fences pending until [`DummyProbe::signal_fences`] is called.
    pub fn set_hold_fences(&self, hold: bool) {
        self.state.lock().hold_fences = hold;
    }

    /// Signal every held fence.
    pub fn signal_fences(&self) {
        let fences = std::mem::take(&mut self.state.lock().pending_fences);
        for fence in fences {
            fence.signal();
        }
    }

    // --- observation ---

    pub fn creation_attempts(&self) -> u32 {
        self.state.lock().create_attempts
    }

    pub fn devices_created(&self) -> u32 {
        self.state.lock().devices_created
    }

    /// Number of cooperative level queries answered so far.
    pub fn cooperative_polls(&self) -> u32 {
        self.state.lock().cooperative_polls
    }

    pub fn reset_calls(&self) -> u32 {
        self.state.lock().reset_calls
    }

    /// Presentation parameters of the last create or reset.
    pub fn last_presentation(&self) -> Option<PresentationParameters> {
        self.state.lock().last_presentation.clone()
    }

    /// Every command that reached a device, in execution order.
    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.state.lock().commands.clone()
    }

    pub fn command_count(&self) -> usize {
        self.state.lock().commands.len()
    }

    /// Number of executed commands with the given opcode.
    pub fn count_op(&self, op: OpCode) -> usize {
        self.state
            .lock()
            .commands
            .iter()
            .filter(|command| command.op() == op)
            .count()
    }

    pub fn clear_commands(&self) {
        self.state.lock().commands.clear();
    }

    pub fn fences_issued(&self) -> u32 {
        self.state.lock().fences_issued
    }

    pub fn live_scratch_surfaces(&self) -> u32 {
        self.state.lock().live_scratch_surfaces
    }
}

/// Dummy driver.
#[derive(Debug, Default)]
pub struct DummyDriver {
    probe: DummyProbe,
}

impl DummyDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a driver observed through an existing probe.
    pub fn with_probe(probe: DummyProbe) -> Self {
        Self { probe }
    }

    pub fn probe(&self) -> &DummyProbe {
        &self.probe
    }

    /// A single hardware adapter with an unsorted mode list that contains a
    /// duplicate and a mode below the minimum size.
    pub fn default_adapters() -> Vec<AdapterInfo> {
        let modes = vec![
            DisplayMode::new(1024, 768, 60, Format::X8R8G8B8),
            DisplayMode::new(320, 240, 60, Format::X8R8G8B8),
            DisplayMode::new(640, 480, 60, Format::X8R8G8B8),
            DisplayMode::new(1920, 1080, 60, Format::X8R8G8B8),
            DisplayMode::new(800, 600, 60, Format::X8R8G8B8),
            DisplayMode::new(640, 480, 60, Format::X8R8G8B8),
            DisplayMode::new(1280, 720, 60, Format::X8R8G8B8),
        ];
        vec![AdapterInfo {
            name: "Dummy Adapter".to_string(),
            vendor_id: 0,
            adapter_type: AdapterType::Discrete,
            capabilities: DeviceCapabilities::default(),
            display_modes: modes,
            windowed_mode: DisplayMode::new(1920, 1080, 60, Format::X8R8G8B8),
        }]
    }
}

impl DeviceDriver for DummyDriver {
    fn name(&self) -> &str {
        "Dummy Driver"
    }

    fn enumerate_adapters(&mut self) -> DeviceResult<Vec<AdapterInfo>> {
        let state = self.probe.state.lock();
        if state.fail_enumeration {
            return Err(DeviceError::EnumerationFailed(
                "dummy driver refused to enumerate".to_string(),
            ));
        }
        log::trace!("DummyDriver: enumerated {} adapters", state.adapters.len());
        Ok(state.adapters.clone())
    }

    fn supports_depth_format(&self, _adapter_index: usize, format: DepthFormat) -> bool {
        !self.probe.state.lock().unsupported_depth.contains(&format)
    }

    fn create_device(&mut self, info: &DeviceCreateInfo<'_>) -> DeviceResult<Box<dyn RawDevice>> {
        let mut state = self.probe.state.lock();
        state.create_attempts += 1;
        if state.create_failures > 0 {
            state.create_failures -= 1;
            log::trace!("DummyDriver: scripted creation failure");
            return Err(DeviceError::CreationFailed {
                attempts: 1,
                reason: "dummy device unavailable".to_string(),
            });
        }
        state.devices_created += 1;
        state.last_presentation = Some(info.presentation.clone());
        log::trace!(
            "DummyDriver: created {:?} device on '{}' ({}x{})",
            info.device_type,
            info.adapter.name,
            info.presentation.back_buffer_width,
            info.presentation.back_buffer_height
        );
        Ok(Box::new(DummyDevice {
            probe: self.probe.clone(),
            capabilities: info.adapter.capabilities,
            back_buffer: info.presentation.back_buffer_extent(),
        }))
    }
}

/// Device created by [`DummyDriver`].
#[derive(Debug)]
pub struct DummyDevice {
    probe: DummyProbe,
    capabilities: DeviceCapabilities,
    back_buffer: Extent2d,
}

impl DummyDevice {
    fn record(&mut self, command: DeviceCommand) -> DeviceResult<()> {
        let delay = self.probe.state.lock().command_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let mut state = self.probe.state.lock();
        let scripted = matches!(&state.fail_next, Some((op, _)) if *op == command.op());
        if scripted {
            if let Some((op, error)) = state.fail_next.take() {
                log::trace!("DummyDevice: scripted failure of {:?}", op);
                return Err(error);
            }
        }
        log::trace!("DummyDevice: {:?}", command);
        state.commands.push(command);
        Ok(())
    }
}

impl RawDevice for DummyDevice {
    fn name(&self) -> &str {
        "Dummy Device"
    }

    fn test_cooperative_level(&mut self) -> CooperativeLevel {
        let mut state = self.probe.state.lock();
        state.cooperative_polls += 1;
        state
            .cooperative_script
            .pop_front()
            .unwrap_or(CooperativeLevel::Ok)
    }

    fn reset(&mut self, presentation: &PresentationParameters) -> DeviceResult<()> {
        let mut state = self.probe.state.lock();
        state.reset_calls += 1;
        let result = state.reset_script.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            state.last_presentation = Some(presentation.clone());
            self.back_buffer = presentation.back_buffer_extent();
        }
        log::trace!("DummyDevice: reset -> {:?}", result);
        result
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn available_texture_memory(&self) -> u64 {
        self.probe.state.lock().available_memory
    }

    fn back_buffer_extent(&self) -> Extent2d {
        self.back_buffer
    }

    fn insert_fence(&mut self) -> Fence {
        let mut state = self.probe.state.lock();
        state.fences_issued += 1;
        if state.hold_fences {
            let fence = Fence::new_pending();
            state.pending_fences.push(fence.clone());
            fence
        } else {
            Fence::new_signaled()
        }
    }

    fn create_scratch_surface(&mut self, extent: Extent2d) -> DeviceResult<SurfaceHandle> {
        let mut state = self.probe.state.lock();
        let handle = SurfaceHandle(state.next_surface);
        state.next_surface += 1;
        state.live_scratch_surfaces += 1;
        log::trace!(
            "DummyDevice: scratch surface {:?} ({}x{})",
            handle,
            extent.width,
            extent.height
        );
        Ok(handle)
    }

    fn release_surface(&mut self, surface: SurfaceHandle) {
        let mut state = self.probe.state.lock();
        state.live_scratch_surfaces = state.live_scratch_surfaces.saturating_sub(1);
        log::trace!("DummyDevice: released surface {:?}", surface);
    }

    fn set_render_state(&mut self, state: RenderStateType, value: u32) -> DeviceResult<()> {
        self.record(DeviceCommand::SetRenderState { state, value })
    }

    fn set_texture_stage_state(
        &mut self,
        stage: u32,
        state: u32,
        value: u32,
    ) -> DeviceResult<()> {
        self.record(DeviceCommand::SetTextureStageState {
            stage,
            state,
            value,
        })
    }

    fn set_sampler_state(&mut self, sampler: u32, state: u32, value: u32) -> DeviceResult<()> {
        self.record(DeviceCommand::SetSamplerState {
            sampler,
            state,
            value,
        })
    }

    fn set_texture(&mut self, stage: u32, texture: Option<TextureHandle>) -> DeviceResult<()> {
        self.record(DeviceCommand::SetTexture { stage, texture })
    }

    fn set_vertex_shader(&mut self, shader: Option<ShaderHandle>) -> DeviceResult<()> {
        self.record(DeviceCommand::SetVertexShader(shader))
    }

    fn set_pixel_shader(&mut self, shader: Option<ShaderHandle>) -> DeviceResult<()> {
        self.record(DeviceCommand::SetPixelShader(shader))
    }

    fn set_vertex_declaration(&mut self, decl: Option<VertexDeclHandle>) -> DeviceResult<()> {
        self.record(DeviceCommand::SetVertexDeclaration(decl))
    }

    fn set_indices(&mut self, buffer: Option<BufferHandle>) -> DeviceResult<()> {
        self.record(DeviceCommand::SetIndices(buffer))
    }

    fn set_stream_source(&mut self, stream: u32, binding: StreamBinding) -> DeviceResult<()> {
        self.record(DeviceCommand::SetStreamSource { stream, binding })
    }

    fn set_vertex_shader_constants(
        &mut self,
        start_register: u32,
        data: &[[f32; 4]],
    ) -> DeviceResult<()> {
        self.record(DeviceCommand::SetVertexShaderConstants {
            start_register,
            data: data.to_vec(),
        })
    }

    fn set_pixel_shader_constants(
        &mut self,
        start_register: u32,
        data: &[[f32; 4]],
    ) -> DeviceResult<()> {
        self.record(DeviceCommand::SetPixelShaderConstants {
            start_register,
            data: data.to_vec(),
        })
    }

    fn set_viewport(&mut self, viewport: &Viewport) -> DeviceResult<()> {
        self.record(DeviceCommand::SetViewport(*viewport))
    }

    fn set_scissor_rect(&mut self, rect: &Rect) -> DeviceResult<()> {
        self.record(DeviceCommand::SetScissorRect(*rect))
    }

    fn set_render_target(
        &mut self,
        index: u32,
        surface: Option<SurfaceHandle>,
    ) -> DeviceResult<()> {
        self.record(DeviceCommand::SetRenderTarget { index, surface })
    }

    fn set_depth_stencil_surface(&mut self, surface: Option<SurfaceHandle>) -> DeviceResult<()> {
        self.record(DeviceCommand::SetDepthStencilSurface(surface))
    }

    fn clear(&mut self, flags: ClearFlags, color: u32, z: f32, stencil: u32) -> DeviceResult<()> {
        self.record(DeviceCommand::Clear {
            flags,
            color,
            z,
            stencil,
        })
    }

    fn begin_scene(&mut self) -> DeviceResult<()> {
        self.record(DeviceCommand::BeginScene)
    }

    fn end_scene(&mut self) -> DeviceResult<()> {
        self.record(DeviceCommand::EndScene)
    }

    fn draw_primitive(
        &mut self,
        primitive: PrimitiveType,
        start_vertex: u32,
        primitive_count: u32,
    ) -> DeviceResult<()> {
        self.record(DeviceCommand::DrawPrimitive {
            primitive,
            start_vertex,
            primitive_count,
        })
    }

    fn draw_indexed_primitive(&mut self, draw: &IndexedDraw) -> DeviceResult<()> {
        self.record(DeviceCommand::DrawIndexedPrimitive(*draw))
    }

    fn present(&mut self) -> DeviceResult<()> {
        self.record(DeviceCommand::Present)
    }
}
